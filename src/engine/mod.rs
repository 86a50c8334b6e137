// src/engine/mod.rs

//! Workflow engine for cozy.
//!
//! This module ties together:
//! - the command registry (one supervisor per configured command)
//! - workflow lookup
//! - sequential execution (each command to completion, fail fast)
//! - the parallel session control loop that reacts to:
//!   - liveness ticks
//!   - dashboard requests (start / stop / restart / inspect / quit)
//!   - termination signals

pub mod registry;
pub mod sequential;
pub mod session;
pub mod signals;
pub mod workflow;

pub use registry::CommandRegistry;
pub use sequential::run_sequence;
pub use session::{
    ParallelSession, SessionHandle, SessionOptions, SessionReport, SessionRequest,
    ShutdownReason,
};
pub use signals::spawn_signal_listener;
pub use workflow::Workflow;
