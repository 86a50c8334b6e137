// src/exec/log.rs

//! Log events emitted by supervisors, and the single subscriber slot they are
//! delivered through.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Callback receiving a supervisor's log events.
pub type LogHandler = Arc<dyn Fn(LogEvent) + Send + Sync>;

/// Lifecycle notices a supervisor reports alongside process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Launching { command: String },
    Exited { command: String, code: i32 },
    Retrying { command: String, attempt: u32, max: u32 },
    /// Terminal: retries are exhausted and nothing will be relaunched.
    GaveUp { command: String, max: u32 },
    Stopping { command: String },
    Restarting { command: String },
    /// End of a one-shot `run_with_logs` invocation.
    Finished { code: Option<i32> },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Launching { command } => write!(f, "Running \"{command}\"..."),
            Notice::Exited { command, code } => {
                write!(f, "Command \"{command}\" exited with code {code}.")
            }
            Notice::Retrying {
                command,
                attempt,
                max,
            } => write!(
                f,
                "Starting command \"{command}\" again (attempt: {attempt}/{max})"
            ),
            Notice::GaveUp { command, max } => write!(
                f,
                "Command \"{command}\" failed too many times ({max}). Please make sure it's valid!"
            ),
            Notice::Stopping { command } => write!(f, "Stopping \"{command}\"..."),
            Notice::Restarting { command } => write!(f, "Restarting \"{command}\"..."),
            Notice::Finished { code: Some(code) } => write!(f, "Done! (exit code {code})"),
            Notice::Finished { code: None } => f.write_str("Done!"),
        }
    }
}

/// One unit delivered to a log subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A line of process output; stdout and stderr are not distinguished.
    Output(String),
    Notice(Notice),
}

impl LogEvent {
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            LogEvent::Notice(n) => Some(n),
            LogEvent::Output(_) => None,
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Output(line) => f.write_str(line),
            LogEvent::Notice(notice) => write!(f, "===== {notice} ====="),
        }
    }
}

/// Holds at most one subscriber. Registering a new one replaces the old one;
/// events emitted before the swap are not replayed.
#[derive(Clone, Default)]
pub struct LogSlot {
    handler: Arc<Mutex<Option<LogHandler>>>,
}

impl LogSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, handler: LogHandler) {
        let mut slot = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(handler);
    }

    pub fn is_subscribed(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Deliver `event` to the current subscriber, if any.
    ///
    /// The slot lock is released before the handler runs.
    pub fn emit(&self, event: LogEvent) {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

impl fmt::Debug for LogSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSlot")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
