use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use cozy::errors::{CozyError, Result};
use cozy::exec::{BoxFuture, LogEvent, LogHandler, Notice, ProbeResult, RunReport, Supervised};

/// Every call a [`FakeSupervisor`] received, in order, across all fakes
/// sharing the same journal.
pub type CallJournal = Arc<Mutex<Vec<(String, &'static str)>>>;

#[derive(Default)]
struct FakeState {
    live: bool,
    handler: Option<LogHandler>,
}

/// A supervisor that never spawns anything.
///
/// - records every call into a shared journal
/// - `start`/`restart` mark it live; `stop` marks it not live
/// - can be told to fail `stop` (after dropping its handle) or to fail
///   one-shot runs with a given exit code
pub struct FakeSupervisor {
    name: String,
    state: Mutex<FakeState>,
    journal: CallJournal,
    fail_stop: bool,
    run_exit_code: i32,
}

impl FakeSupervisor {
    pub fn new(name: &str, journal: CallJournal) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(FakeState::default()),
            journal,
            fail_stop: false,
            run_exit_code: 0,
        }
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn failing_run(mut self, code: i32) -> Self {
        self.run_exit_code = code;
        self
    }

    pub fn is_live(&self) -> bool {
        self.state.lock().unwrap().live
    }

    pub fn has_subscriber(&self) -> bool {
        self.state.lock().unwrap().handler.is_some()
    }

    fn record(&self, call: &'static str) {
        self.journal.lock().unwrap().push((self.name.clone(), call));
    }

    fn emit(&self, event: LogEvent) {
        let handler = self.state.lock().unwrap().handler.clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn set_live(&self, live: bool) {
        self.state.lock().unwrap().live = live;
    }
}

impl Supervised for FakeSupervisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn track_log(&self, handler: LogHandler) {
        self.record("track_log");
        self.state.lock().unwrap().handler = Some(handler);
    }

    fn start(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record("start");
            self.emit(LogEvent::Notice(Notice::Launching {
                command: self.name.clone(),
            }));
            self.set_live(true);
            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record("stop");
            self.set_live(false);
            if self.fail_stop {
                return Err(CozyError::Other(anyhow!("simulated stop failure")));
            }
            Ok(())
        })
    }

    fn restart(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record("restart");
            self.set_live(true);
            Ok(())
        })
    }

    fn probe(&self) -> BoxFuture<'_, ProbeResult> {
        Box::pin(async move {
            ProbeResult {
                running: self.is_live(),
            }
        })
    }

    fn has_live_process(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.is_live() })
    }

    fn run_to_completion(&self) -> BoxFuture<'_, Result<RunReport>> {
        Box::pin(async move {
            self.record("run");
            if self.run_exit_code != 0 {
                return Err(CozyError::CommandFailed {
                    command: self.name.clone(),
                    code: self.run_exit_code,
                    output: format!("{} failed\n", self.name),
                });
            }
            Ok(RunReport {
                command: self.name.clone(),
                code: 0,
                output: format!("{} ok\n", self.name),
            })
        })
    }

    fn run_with_logs(&self, handler: LogHandler) -> BoxFuture<'_, Result<i32>> {
        Box::pin(async move {
            self.record("inspect");
            handler(LogEvent::Output(format!("{} output", self.name)));
            handler(LogEvent::Notice(Notice::Finished {
                code: Some(self.run_exit_code),
            }));
            Ok(self.run_exit_code)
        })
    }
}
