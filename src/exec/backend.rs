// src/exec/backend.rs

//! Pluggable supervisor abstraction.
//!
//! The workflow engine talks to a `Supervised` implementation instead of a
//! concrete [`ProcessSupervisor`]. Production code uses the real supervisor;
//! tests can provide one that records calls without spawning processes.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::exec::log::LogHandler;
use crate::exec::one_shot::RunReport;
use crate::exec::supervisor::{ProbeResult, ProcessSupervisor};

/// Boxed future returned by [`Supervised`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the workflow engine needs from a supervised command.
pub trait Supervised: Send + Sync {
    /// Unique command key from the config.
    fn name(&self) -> &str;

    /// Human label for logs and dashboards.
    fn display_name(&self) -> &str;

    fn track_log(&self, handler: LogHandler);

    fn start(&self) -> BoxFuture<'_, Result<()>>;

    fn stop(&self) -> BoxFuture<'_, Result<()>>;

    fn restart(&self) -> BoxFuture<'_, Result<()>>;

    fn probe(&self) -> BoxFuture<'_, ProbeResult>;

    /// Whether a process handle is still owned. Checked after each stop at
    /// session shutdown.
    fn has_live_process(&self) -> BoxFuture<'_, bool>;

    /// One-shot execution awaited to completion (sequential workflows).
    fn run_to_completion(&self) -> BoxFuture<'_, Result<RunReport>>;

    /// One-shot execution streaming into `handler`; returns the exit code.
    fn run_with_logs(&self, handler: LogHandler) -> BoxFuture<'_, Result<i32>>;
}

impl Supervised for ProcessSupervisor {
    fn name(&self) -> &str {
        ProcessSupervisor::name(self)
    }

    fn display_name(&self) -> &str {
        ProcessSupervisor::display_name(self)
    }

    fn track_log(&self, handler: LogHandler) {
        ProcessSupervisor::track_log(self, handler);
    }

    fn start(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(ProcessSupervisor::start(self))
    }

    fn stop(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(ProcessSupervisor::stop(self))
    }

    fn restart(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(ProcessSupervisor::restart(self))
    }

    fn probe(&self) -> BoxFuture<'_, ProbeResult> {
        Box::pin(ProcessSupervisor::probe(self))
    }

    fn has_live_process(&self) -> BoxFuture<'_, bool> {
        Box::pin(ProcessSupervisor::has_live_process(self))
    }

    fn run_to_completion(&self) -> BoxFuture<'_, Result<RunReport>> {
        Box::pin(ProcessSupervisor::run_to_completion(self))
    }

    fn run_with_logs(&self, handler: LogHandler) -> BoxFuture<'_, Result<i32>> {
        Box::pin(ProcessSupervisor::run_with_logs(self, handler))
    }
}
