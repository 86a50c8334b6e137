// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands defined in
//! the config, using `tokio::process::Command`, and reporting what happens to
//! whoever subscribed to a command's logs.
//!
//! - [`supervisor`] owns the long-running, restart-on-failure supervisor.
//! - [`one_shot`] runs a command once, outside supervision.
//! - [`process`] spawns and kills OS process trees.
//! - [`log`] defines log events and the single-subscriber slot.
//! - [`backend`] provides the `Supervised` trait the engine drives, which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod log;
pub mod one_shot;
pub mod process;
pub mod supervisor;

pub use backend::{BoxFuture, Supervised};
pub use log::{LogEvent, LogHandler, LogSlot, Notice};
pub use one_shot::{OneShot, RunOutput, RunReport};
pub use supervisor::{
    MAX_RETRIES, ProbeResult, ProcessSupervisor, RestartPolicy, SupervisorStatus,
};
