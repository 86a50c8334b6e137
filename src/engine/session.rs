// src/engine/session.rs

//! Parallel workflow session.
//!
//! A [`ParallelSession`] starts every command of a workflow under the restart
//! policy, probes their liveness on a fixed period, and serves requests from
//! the dashboard until it is asked to quit. Shutdown is coordinated by the
//! session's own control loop and runs exactly once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Timing;
use crate::dashboard::Dashboard;
use crate::errors::{CozyError, Result};
use crate::exec::{ProcessSupervisor, Supervised};

use super::registry::CommandRegistry;
use super::workflow::Workflow;

const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// Why a session shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// OS termination signal, e.g. `"SIGINT"`.
    Signal(&'static str),
    /// The dashboard user asked to quit.
    UserQuit,
    InternalError(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(sig) => write!(f, "received {sig}"),
            ShutdownReason::UserQuit => f.write_str("user quit"),
            ShutdownReason::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

/// Requests a dashboard (or signal listener) can send into a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    Start(String),
    Stop(String),
    Restart(String),
    /// Run the command once and stream its output to the dashboard.
    Inspect(String),
    Quit(ShutdownReason),
}

/// Cloneable sender side of a session's request channel.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    pub async fn send(&self, request: SessionRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|e| CozyError::Other(anyhow!("session is no longer running: {e}")))
    }

    /// Send from a thread outside the runtime.
    pub fn blocking_send(&self, request: SessionRequest) -> Result<()> {
        self.tx
            .blocking_send(request)
            .map_err(|e| CozyError::Other(anyhow!("session is no longer running: {e}")))
    }

    pub async fn start(&self, command: impl Into<String>) -> Result<()> {
        self.send(SessionRequest::Start(command.into())).await
    }

    pub async fn stop(&self, command: impl Into<String>) -> Result<()> {
        self.send(SessionRequest::Stop(command.into())).await
    }

    pub async fn restart(&self, command: impl Into<String>) -> Result<()> {
        self.send(SessionRequest::Restart(command.into())).await
    }

    pub async fn inspect(&self, command: impl Into<String>) -> Result<()> {
        self.send(SessionRequest::Inspect(command.into())).await
    }

    pub async fn quit(&self, reason: ShutdownReason) -> Result<()> {
        self.send(SessionRequest::Quit(reason)).await
    }

    /// True once the session has finished and dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Session timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Period of the liveness tick.
    pub probe_interval: Duration,
    /// Settle period after every command was stopped.
    pub shutdown_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Timing::default().into()
    }
}

impl From<Timing> for SessionOptions {
    fn from(timing: Timing) -> Self {
        Self {
            probe_interval: timing.probe_interval,
            shutdown_grace: timing.shutdown_grace,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: ShutdownReason,
    /// Commands whose `stop` returned an error during shutdown.
    pub stop_failures: Vec<String>,
}

/// Drives one parallel workflow for its whole lifetime.
pub struct ParallelSession<S = ProcessSupervisor> {
    workflow: String,
    /// Workflow commands, in declaration order.
    members: Vec<Arc<S>>,
    /// Every known command; `Inspect` may target any of them.
    registry: CommandRegistry<S>,
    dashboard: Arc<dyn Dashboard>,
    options: SessionOptions,
    handle: SessionHandle,
    requests: mpsc::Receiver<SessionRequest>,
    inspections: JoinSet<()>,
}

impl<S> fmt::Debug for ParallelSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelSession")
            .field("workflow", &self.workflow)
            .field("members", &self.members.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<S: Supervised + 'static> ParallelSession<S> {
    /// Resolve `workflow` against `registry`.
    ///
    /// Unknown command names fail here, before anything is started.
    pub fn new(
        registry: &CommandRegistry<S>,
        workflow: &Workflow,
        dashboard: Arc<dyn Dashboard>,
        options: SessionOptions,
    ) -> Result<Self> {
        let members = registry.resolve(workflow.commands())?;
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);

        Ok(Self {
            workflow: workflow.name().to_string(),
            members,
            registry: registry.clone(),
            dashboard,
            options,
            handle: SessionHandle { tx },
            requests: rx,
            inspections: JoinSet::new(),
        })
    }

    /// Handle for sending requests into the session.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Start every command and serve requests until a `Quit` arrives, then
    /// shut down.
    pub async fn run(mut self) -> Result<SessionReport> {
        info!(
            workflow = %self.workflow,
            commands = self.members.len(),
            probe_interval = ?self.options.probe_interval,
            "parallel session started"
        );

        for member in &self.members {
            member.track_log(self.dashboard.log_handler(member.name()));
        }

        if let Some(reason) = self.start_all().await {
            return Ok(self.shutdown(reason).await);
        }

        let mut ticker = tokio::time::interval(self.options.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the first probe happens one
        // period after startup.
        ticker.tick().await;

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => self.probe_all().await,

                request = self.requests.recv() => match request {
                    Some(SessionRequest::Quit(reason)) => break reason,
                    Some(request) => self.handle_request(request).await,
                    None => break ShutdownReason::InternalError(
                        "session request channel closed".to_string(),
                    ),
                },

                Some(joined) = self.inspections.join_next() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "inspection task failed");
                    }
                }
            }
        };

        drop(ticker);
        Ok(self.shutdown(reason).await)
    }

    async fn start_all(&self) -> Option<ShutdownReason> {
        for member in &self.members {
            if let Err(e) = member.start().await {
                error!(command = %member.name(), error = %e, "failed to start command");
                return Some(ShutdownReason::InternalError(format!(
                    "failed to start \"{}\": {e}",
                    member.name()
                )));
            }
        }
        None
    }

    async fn probe_all(&self) {
        for member in &self.members {
            let probe = member.probe().await;
            debug!(command = %member.name(), running = probe.running, "liveness probe");
            self.dashboard.report_liveness(member.name(), probe);
        }
    }

    fn member(&self, name: &str) -> Option<&Arc<S>> {
        self.members.iter().find(|m| m.name() == name)
    }

    async fn handle_request(&mut self, request: SessionRequest) {
        debug!(?request, "session request");

        match request {
            SessionRequest::Start(name) => {
                let Some(member) = self.member(&name) else {
                    warn!(command = %name, "start requested for a command outside this workflow");
                    return;
                };
                if let Err(e) = member.start().await {
                    warn!(command = %name, error = %e, "start request failed");
                }
            }
            SessionRequest::Stop(name) => {
                let Some(member) = self.member(&name) else {
                    warn!(command = %name, "stop requested for a command outside this workflow");
                    return;
                };
                if let Err(e) = member.stop().await {
                    warn!(command = %name, error = %e, "stop request failed");
                }
            }
            SessionRequest::Restart(name) => {
                let Some(member) = self.member(&name) else {
                    warn!(command = %name, "restart requested for a command outside this workflow");
                    return;
                };
                if let Err(e) = member.restart().await {
                    warn!(command = %name, error = %e, "restart request failed");
                }
            }
            SessionRequest::Inspect(name) => self.inspect(name),
            SessionRequest::Quit(_) => {}
        }
    }

    fn inspect(&mut self, name: String) {
        let Some(supervisor) = self.registry.get(&name) else {
            warn!(command = %name, "inspect requested for an unknown command");
            return;
        };

        let handler = self.dashboard.inspect_handler(&name);
        self.inspections.spawn(async move {
            match supervisor.run_with_logs(handler).await {
                Ok(code) => debug!(command = %name, exit_code = code, "inspection finished"),
                Err(e) => warn!(command = %name, error = %e, "inspection failed"),
            }
        });
    }

    /// Stop everything, then wait out the grace period.
    ///
    /// A failure stopping one command is logged and does not prevent the
    /// others from being stopped.
    async fn shutdown(mut self, reason: ShutdownReason) -> SessionReport {
        info!(workflow = %self.workflow, %reason, "shutting down parallel session");

        // No more requests; senders now see a closed session.
        self.requests.close();
        self.inspections.abort_all();

        let mut stop_failures = Vec::new();
        for member in &self.members {
            if let Err(e) = member.stop().await {
                error!(command = %member.name(), error = %e, "failed to stop command");
                stop_failures.push(member.name().to_string());
            } else if member.has_live_process().await {
                error!(command = %member.name(), "command still owns a process after stop");
                stop_failures.push(member.name().to_string());
            }
        }

        tokio::time::sleep(self.options.shutdown_grace).await;
        info!(
            workflow = %self.workflow,
            failures = stop_failures.len(),
            "parallel session finished"
        );

        SessionReport {
            reason,
            stop_failures,
        }
    }
}
