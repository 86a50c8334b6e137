// src/exec/supervisor.rs

//! Process supervisor.
//!
//! A [`ProcessSupervisor`] wraps one [`CommandDefinition`] and owns at most
//! one OS process at a time. Processes launched through `start`/`restart` are
//! watched by a monitor task which, on a non-zero exit, relaunches the command
//! until the retry budget is spent.
//!
//! Each launch opens a new *episode*. The monitor task of an episode owns the
//! child process and loops over retries; `stop` (or a later launch) cancels the
//! episode through a oneshot channel and waits for the monitor to confirm the
//! process tree is gone. Exit events from an episode that is no longer current
//! are ignored, so a stale exit can never trigger a relaunch.

use std::fmt;
use std::io;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::process::Child;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::CommandDefinition;
use crate::errors::{CozyError, Result};
use crate::exec::log::{LogEvent, LogHandler, LogSlot, Notice};
use crate::exec::one_shot::{self, RunOutput, RunReport};
use crate::exec::process::{
    ABNORMAL_EXIT, attach_output, build_command, drain_output, exit_code, kill_group, kill_tree,
    sever_output,
};

/// Number of automatic relaunches before a failing command is given up on.
pub const MAX_RETRIES: u32 = 3;

/// Whether and how often a supervised command is relaunched after a
/// non-zero exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub restart_when_fails: bool,
    pub max_retries: u32,
}

impl RestartPolicy {
    /// Relaunch on failure, up to [`MAX_RETRIES`] times.
    pub fn on_failure() -> Self {
        Self {
            restart_when_fails: true,
            max_retries: MAX_RETRIES,
        }
    }

    pub fn never() -> Self {
        Self {
            restart_when_fails: false,
            max_retries: 0,
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::on_failure()
    }
}

/// Where a supervisor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    /// Never launched.
    Idle,
    Running,
    /// Exited on its own and was not relaunched.
    Exited(i32),
    /// Stopped on request.
    Stopped,
    /// Retries exhausted; stays down until an explicit start/restart.
    FailedPermanently,
}

/// Liveness snapshot returned by `probe`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub running: bool,
}

#[derive(Debug)]
struct LiveProcess {
    episode: u64,
    pid: Option<u32>,
    /// Set as soon as the current process exits, before the exit is handled.
    exit_code: Option<i32>,
    cancel: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

impl LiveProcess {
    fn is_running(&self) -> bool {
        self.pid.is_some() && self.exit_code.is_none() && !self.monitor.is_finished()
    }
}

#[derive(Debug)]
struct SupervisorState {
    live: Option<LiveProcess>,
    retry_count: u32,
    /// Set by `stop`; an exit observed while set never relaunches.
    killing: bool,
    status: SupervisorStatus,
    next_episode: u64,
}

impl SupervisorState {
    fn current_mut(&mut self, episode: u64) -> Option<&mut LiveProcess> {
        self.live.as_mut().filter(|live| live.episode == episode)
    }
}

struct Inner {
    name: String,
    label: String,
    definition: CommandDefinition,
    policy: RestartPolicy,
    state: Mutex<SupervisorState>,
    logs: LogSlot,
}

impl Inner {
    fn notify(&self, notice: Notice) {
        self.logs.emit(LogEvent::Notice(notice));
    }

    fn spawn_child(&self) -> io::Result<Child> {
        build_command(&self.definition).spawn()
    }

    fn output_sink(&self) -> Arc<dyn Fn(String) + Send + Sync> {
        let logs = self.logs.clone();
        Arc::new(move |line: String| logs.emit(LogEvent::Output(line)))
    }

    async fn record_exit(&self, episode: u64, code: i32) {
        let mut state = self.state.lock().await;
        if let Some(live) = state.current_mut(episode) {
            live.exit_code = Some(code);
        }
    }

    /// Decide what happens after the current process of `episode` exited.
    ///
    /// Returns the relaunched child when the restart policy applies.
    async fn after_exit(&self, episode: u64, code: i32) -> Option<io::Result<Child>> {
        let mut state = self.state.lock().await;

        if state.current_mut(episode).is_none() {
            debug!(command = %self.name, episode, "exit from a replaced process; ignoring");
            return None;
        }

        if state.killing {
            state.live = None;
            state.status = SupervisorStatus::Stopped;
            return None;
        }

        if code == 0 || !self.policy.restart_when_fails {
            state.live = None;
            state.status = SupervisorStatus::Exited(code);
            return None;
        }

        if state.retry_count >= self.policy.max_retries {
            state.live = None;
            state.status = SupervisorStatus::FailedPermanently;
            drop(state);

            warn!(
                command = %self.name,
                max_retries = self.policy.max_retries,
                "command failed too many times; giving up"
            );
            self.notify(Notice::GaveUp {
                command: self.label.clone(),
                max: self.policy.max_retries,
            });
            return None;
        }

        state.retry_count += 1;
        let attempt = state.retry_count;
        let next = self.spawn_child();
        if let Some(live) = state.current_mut(episode) {
            live.pid = next.as_ref().ok().and_then(Child::id);
            live.exit_code = None;
        }
        state.status = SupervisorStatus::Running;
        drop(state);

        info!(
            command = %self.name,
            attempt,
            max_retries = self.policy.max_retries,
            exit_code = code,
            "relaunching failed command"
        );
        self.notify(Notice::Retrying {
            command: self.label.clone(),
            attempt,
            max: self.policy.max_retries,
        });

        Some(next)
    }
}

/// Monitor task for one launch episode.
///
/// Loops over retries instead of recursing: each iteration waits for the
/// current child to exit (or for cancellation), then asks `after_exit`
/// whether to go round again.
async fn supervise(
    inner: Arc<Inner>,
    episode: u64,
    first: io::Result<Child>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let mut spawned = first;

    loop {
        let code = match spawned {
            Ok(mut child) => {
                let pid = child.id();
                let readers = attach_output(&mut child, inner.output_sink());

                tokio::select! {
                    status_res = child.wait() => {
                        let code = match status_res {
                            Ok(status) => exit_code(status),
                            Err(e) => {
                                warn!(
                                    command = %inner.name,
                                    error = %e,
                                    "failed waiting for process"
                                );
                                ABNORMAL_EXIT
                            }
                        };
                        inner.record_exit(episode, code).await;

                        // Take down anything the process left behind in its group.
                        if let Some(pid) = pid {
                            kill_group(pid);
                        }
                        drain_output(readers).await;

                        info!(
                            command = %inner.name,
                            ?pid,
                            exit_code = code,
                            "command process exited"
                        );
                        code
                    }

                    _ = &mut cancel_rx => {
                        sever_output(readers);
                        match kill_tree(&mut child).await {
                            Ok(status) => debug!(
                                command = %inner.name,
                                ?pid,
                                exit_code = exit_code(status),
                                "process tree killed"
                            ),
                            Err(e) => warn!(
                                command = %inner.name,
                                ?pid,
                                error = %e,
                                "failed to confirm process termination"
                            ),
                        }
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(command = %inner.name, error = %e, "failed to launch command");
                inner
                    .logs
                    .emit(LogEvent::Output(format!("failed to launch: {e}")));
                inner.record_exit(episode, ABNORMAL_EXIT).await;
                ABNORMAL_EXIT
            }
        };

        inner.notify(Notice::Exited {
            command: inner.label.clone(),
            code,
        });

        match inner.after_exit(episode, code).await {
            Some(next) => spawned = next,
            None => return,
        }
    }
}

/// Supervises one named command. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("name", &self.inner.name)
            .field("label", &self.inner.label)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Supervisor with the default restart-on-failure policy.
    pub fn new(name: impl Into<String>, definition: CommandDefinition) -> Self {
        Self::with_policy(name, definition, RestartPolicy::default())
    }

    pub fn with_policy(
        name: impl Into<String>,
        definition: CommandDefinition,
        policy: RestartPolicy,
    ) -> Self {
        let label = definition.display_name();
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                label,
                definition,
                policy,
                state: Mutex::new(SupervisorState {
                    live: None,
                    retry_count: 0,
                    killing: false,
                    status: SupervisorStatus::Idle,
                    next_episode: 0,
                }),
                logs: LogSlot::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn display_name(&self) -> &str {
        &self.inner.label
    }

    pub fn definition(&self) -> &CommandDefinition {
        &self.inner.definition
    }

    pub fn policy(&self) -> RestartPolicy {
        self.inner.policy
    }

    /// Register the log subscriber, replacing any previous one.
    pub fn track_log(&self, handler: LogHandler) {
        self.inner.logs.replace(handler);
    }

    /// Launch the command under the restart policy, stopping a live process
    /// first.
    ///
    /// Does not wait on the new process; launch failures show up as an exit
    /// with code `-1`.
    pub async fn start(&self) -> Result<()> {
        self.inner.notify(Notice::Launching {
            command: self.inner.label.clone(),
        });
        self.launch().await
    }

    /// Kill the live process and its descendants, waiting for termination.
    ///
    /// A no-op when nothing is live.
    pub async fn stop(&self) -> Result<()> {
        let live = {
            let mut state = self.inner.state.lock().await;
            state.killing = true;
            let live = state.live.take();
            if live.is_some() {
                state.status = SupervisorStatus::Stopped;
            }
            live
        };

        let Some(live) = live else {
            debug!(command = %self.inner.name, "stop requested with no live process");
            return Ok(());
        };

        info!(command = %self.inner.name, pid = ?live.pid, "stopping command");
        self.inner.notify(Notice::Stopping {
            command: self.inner.label.clone(),
        });
        self.terminate(live).await
    }

    /// Reset the retry budget, then relaunch if nothing is live or the live
    /// process already exited with code 0. A process that is still running
    /// is only stopped.
    pub async fn restart(&self) -> Result<()> {
        self.inner.notify(Notice::Restarting {
            command: self.inner.label.clone(),
        });

        let relaunch = {
            let mut state = self.inner.state.lock().await;
            state.retry_count = 0;
            state
                .live
                .as_ref()
                .is_none_or(|live| live.exit_code == Some(0))
        };

        if relaunch {
            self.launch().await
        } else {
            self.stop().await
        }
    }

    /// Liveness of the current process. Never fails.
    pub async fn probe(&self) -> ProbeResult {
        let state = self.inner.state.lock().await;
        ProbeResult {
            running: state.live.as_ref().is_some_and(LiveProcess::is_running),
        }
    }

    pub async fn status(&self) -> SupervisorStatus {
        self.inner.state.lock().await.status
    }

    pub async fn retry_count(&self) -> u32 {
        self.inner.state.lock().await.retry_count
    }

    /// Whether a process handle is currently owned.
    pub async fn has_live_process(&self) -> bool {
        self.inner.state.lock().await.live.is_some()
    }

    pub async fn pid(&self) -> Option<u32> {
        self.inner
            .state
            .lock()
            .await
            .live
            .as_ref()
            .and_then(|live| live.pid)
    }

    /// One-shot execution, outside supervision. See [`one_shot::run`].
    pub async fn run(&self) -> Result<RunOutput> {
        one_shot::run(&self.inner.name, &self.inner.definition).await
    }

    /// One-shot execution awaited to completion.
    pub async fn run_to_completion(&self) -> Result<RunReport> {
        self.run().await?.finish().await
    }

    /// One-shot execution streaming output into `handler`. See
    /// [`one_shot::run_with_logs`].
    pub async fn run_with_logs(&self, handler: LogHandler) -> Result<i32> {
        one_shot::run_with_logs(&self.inner.name, &self.inner.definition, handler).await
    }

    async fn launch(&self) -> Result<()> {
        // Stop whatever is live before spawning; loop in case another launch
        // slipped in while we were waiting.
        let mut state = loop {
            let mut state = self.inner.state.lock().await;
            match state.live.take() {
                None => break state,
                Some(live) => {
                    state.killing = true;
                    drop(state);
                    self.terminate(live).await?;
                }
            }
        };

        state.killing = false;
        let episode = state.next_episode;
        state.next_episode += 1;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let child = self.inner.spawn_child();
        let pid = child.as_ref().ok().and_then(Child::id);
        let monitor = tokio::spawn(supervise(Arc::clone(&self.inner), episode, child, cancel_rx));

        state.live = Some(LiveProcess {
            episode,
            pid,
            exit_code: None,
            cancel: Some(cancel_tx),
            monitor,
        });
        state.status = SupervisorStatus::Running;
        drop(state);

        info!(command = %self.inner.name, ?pid, episode, "command launched");
        Ok(())
    }

    /// Cancel an episode and wait for its monitor to confirm the process tree
    /// is dead. Must be called without holding the state lock.
    async fn terminate(&self, mut live: LiveProcess) -> Result<()> {
        if let Some(cancel) = live.cancel.take() {
            if cancel.send(()).is_err() {
                debug!(
                    command = %self.inner.name,
                    episode = live.episode,
                    "monitor already finished while cancelling"
                );
            }
        }

        live.monitor.await.map_err(|e| {
            CozyError::Other(anyhow!(
                "monitor task for command '{}' failed: {e}",
                self.inner.name
            ))
        })
    }
}
