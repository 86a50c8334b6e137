// src/dashboard/console.rs

//! Line-oriented dashboard: every log line goes to stdout prefixed with its
//! command name, and control commands are read from stdin.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use crate::engine::{SessionHandle, SessionRequest, ShutdownReason};
use crate::exec::{LogEvent, LogHandler, ProbeResult};

use super::Dashboard;

/// Writes prefixed lines to stdout and tracks liveness transitions.
#[derive(Debug, Default)]
pub struct ConsoleDashboard {
    /// Width the `[name]` prefix is padded to.
    prefix_width: usize,
    last_liveness: Mutex<HashMap<String, bool>>,
}

impl ConsoleDashboard {
    /// Dashboard whose prefixes line up for every name in `commands`.
    pub fn new<'a>(commands: impl IntoIterator<Item = &'a str>) -> Self {
        let prefix_width = commands
            .into_iter()
            .map(|name| prefix(name).len())
            .max()
            .unwrap_or(0);
        Self {
            prefix_width,
            last_liveness: Mutex::new(HashMap::new()),
        }
    }

    fn handler_for(&self, label: String) -> LogHandler {
        let width = self.prefix_width;
        Arc::new(move |event: LogEvent| print_line(&format_line(&label, width, &event)))
    }
}

impl Dashboard for ConsoleDashboard {
    fn log_handler(&self, command: &str) -> LogHandler {
        self.handler_for(command.to_string())
    }

    fn inspect_handler(&self, command: &str) -> LogHandler {
        self.handler_for(format!("{command}:inspect"))
    }

    fn report_liveness(&self, command: &str, probe: ProbeResult) {
        let previous = self
            .last_liveness
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.to_string(), probe.running);

        if previous == Some(probe.running) {
            return;
        }

        info!(command = %command, running = probe.running, "liveness changed");
        if previous.is_some() || !probe.running {
            let state = if probe.running { "running" } else { "not running" };
            print_line(&format_line(
                command,
                self.prefix_width,
                &LogEvent::Output(format!("----- {state} -----")),
            ));
        }
    }
}

fn prefix(command: &str) -> String {
    format!("[{command}]")
}

/// Render one dashboard line: the padded `[command]` prefix, then the event.
pub fn format_line(command: &str, width: usize, event: &LogEvent) -> String {
    format!("{:<width$} {event}", prefix(command))
}

fn print_line(line: &str) {
    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{line}") {
        debug!(error = %e, "failed to write dashboard line");
    }
}

/// Parse one stdin control line.
///
/// Blank lines yield `Ok(None)`. Recognised forms are `start <name>`,
/// `stop <name>`, `restart <name>`, `run <name>` and `quit`.
pub fn parse_control_line(line: &str) -> Result<Option<SessionRequest>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let target = words.next().map(str::to_string);
    if words.next().is_some() {
        return Err(format!("too many arguments in \"{}\"", line.trim()));
    }

    let needs_target = |make: fn(String) -> SessionRequest| {
        target
            .clone()
            .map(|name| Some(make(name)))
            .ok_or_else(|| format!("`{verb}` needs a command name"))
    };

    match verb {
        "start" => needs_target(SessionRequest::Start),
        "stop" => needs_target(SessionRequest::Stop),
        "restart" => needs_target(SessionRequest::Restart),
        "run" | "inspect" => needs_target(SessionRequest::Inspect),
        "quit" | "q" | "exit" if target.is_none() => {
            Ok(Some(SessionRequest::Quit(ShutdownReason::UserQuit)))
        }
        "quit" | "q" | "exit" => Err(format!("`{verb}` takes no arguments")),
        other => Err(format!(
            "unknown control \"{other}\"; expected start, stop, restart, run or quit"
        )),
    }
}

/// Read control lines from stdin and forward them to the session.
///
/// The read blocks, so it runs on a detached thread that never holds the
/// runtime open. Stops at end of input or once the session is gone.
pub fn spawn_stdin_controls(handle: SessionHandle) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed reading dashboard controls");
                    return;
                }
            };

            match parse_control_line(&line) {
                Ok(Some(request)) => {
                    if handle.blocking_send(request).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(msg) => warn!("{msg}"),
            }
        }
        debug!("stdin closed; no more dashboard controls");
    })
}
