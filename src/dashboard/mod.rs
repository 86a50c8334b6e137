// src/dashboard/mod.rs

//! Consumers of supervisor output.
//!
//! A [`Dashboard`] hands out log subscribers for each command and receives
//! the liveness reports of a parallel session. It may hold a
//! [`SessionHandle`](crate::engine::SessionHandle) to send requests back, and
//! must send a quit request when its user exits.

pub mod console;

pub use console::{ConsoleDashboard, parse_control_line, spawn_stdin_controls};

use crate::exec::{LogHandler, ProbeResult};

pub trait Dashboard: Send + Sync {
    /// Subscriber for the supervised logs of `command`.
    fn log_handler(&self, command: &str) -> LogHandler;

    /// Subscriber for a one-shot inspection of `command`.
    fn inspect_handler(&self, command: &str) -> LogHandler {
        self.log_handler(command)
    }

    fn report_liveness(&self, command: &str, probe: ProbeResult);
}
