#![allow(dead_code)]

pub use cozy_test_utils::builders;
pub use cozy_test_utils::fake_supervisor::{CallJournal, FakeSupervisor};
pub use cozy_test_utils::{eventually, init_tracing, recording_handler, with_timeout};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cozy::exec::{LogEvent, Notice};

/// Generous upper bound for anything involving real processes.
pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(10);

pub fn journal() -> CallJournal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Calls recorded in `journal` for `command`, in order.
pub fn calls_for(journal: &CallJournal, command: &str) -> Vec<&'static str> {
    journal
        .lock()
        .unwrap()
        .iter()
        .filter(|(name, _)| name == command)
        .map(|(_, call)| *call)
        .collect()
}

pub fn notices(events: &Arc<Mutex<Vec<LogEvent>>>) -> Vec<Notice> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|ev| ev.notice().cloned())
        .collect()
}

pub fn output_lines(events: &Arc<Mutex<Vec<LogEvent>>>) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|ev| match ev {
            LogEvent::Output(line) => Some(line.clone()),
            LogEvent::Notice(_) => None,
        })
        .collect()
}
