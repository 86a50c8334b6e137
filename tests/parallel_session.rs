// tests/parallel_session.rs

mod common;
use crate::common::builders::{CommandConfigBuilder, ConfigFileBuilder};
use crate::common::{
    FakeSupervisor, PROCESS_TIMEOUT, calls_for, eventually, init_tracing, journal, with_timeout,
};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cozy::dashboard::Dashboard;
use cozy::engine::{
    CommandRegistry, ParallelSession, SessionOptions, SessionRequest, ShutdownReason, Workflow,
};
use cozy::errors::CozyError;
use cozy::exec::{LogEvent, LogHandler, ProbeResult, Supervised};
use cozy::types::ExecutionMode;

const LIMIT: Duration = Duration::from_secs(5);

/// Dashboard that records what the session hands it.
#[derive(Default)]
struct RecordingDashboard {
    lines: Arc<Mutex<Vec<(String, LogEvent)>>>,
    liveness: Mutex<Vec<(String, bool)>>,
}

impl RecordingDashboard {
    fn lines_for(&self, command: &str) -> Vec<LogEvent> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == command)
            .map(|(_, ev)| ev.clone())
            .collect()
    }

    fn reported(&self, command: &str) -> Vec<bool> {
        self.liveness
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == command)
            .map(|(_, running)| *running)
            .collect()
    }
}

impl Dashboard for RecordingDashboard {
    fn log_handler(&self, command: &str) -> LogHandler {
        let lines = Arc::clone(&self.lines);
        let command = command.to_string();
        Arc::new(move |ev: LogEvent| lines.lock().unwrap().push((command.clone(), ev)))
    }

    fn inspect_handler(&self, command: &str) -> LogHandler {
        self.log_handler(&format!("{command}:inspect"))
    }

    fn report_liveness(&self, command: &str, probe: ProbeResult) {
        self.liveness
            .lock()
            .unwrap()
            .push((command.to_string(), probe.running));
    }
}

fn fast_options() -> SessionOptions {
    SessionOptions {
        probe_interval: Duration::from_millis(20),
        shutdown_grace: Duration::from_millis(10),
    }
}

struct Fixture {
    journal: common::CallJournal,
    registry: CommandRegistry<FakeSupervisor>,
    workflow: Workflow,
    dashboard: Arc<RecordingDashboard>,
}

fn fixture(failing_stop: &str) -> Fixture {
    let journal = journal();
    let mut registry = CommandRegistry::new();
    for name in ["a", "b", "c"] {
        let mut sup = FakeSupervisor::new(name, journal.clone());
        if name == failing_stop {
            sup = sup.failing_stop();
        }
        registry.insert(sup);
    }
    // Registered, but not part of the workflow.
    registry.insert(FakeSupervisor::new("lint", journal.clone()));

    Fixture {
        journal,
        registry,
        workflow: Workflow::new("dev", ["a", "b", "c"], ExecutionMode::Parallel),
        dashboard: Arc::new(RecordingDashboard::default()),
    }
}

async fn all_live(registry: &CommandRegistry<FakeSupervisor>, names: &[&str]) -> bool {
    names.iter().all(|n| registry.get(n).is_some_and(|s| s.is_live()))
}

async fn live_processes<S: Supervised>(registry: &CommandRegistry<S>, names: &[&str]) -> usize {
    let mut live = 0;
    for name in names {
        if let Some(sup) = registry.get(name) {
            if sup.has_live_process().await {
                live += 1;
            }
        }
    }
    live
}

#[tokio::test]
async fn shutdown_stops_everything_even_if_one_stop_fails() {
    init_tracing();
    let fx = fixture("b");
    let session = ParallelSession::new(
        &fx.registry,
        &fx.workflow,
        fx.dashboard.clone(),
        fast_options(),
    )
    .unwrap();
    let handle = session.handle();
    let running = tokio::spawn(session.run());

    assert!(eventually(LIMIT, || all_live(&fx.registry, &["a", "b", "c"])).await);

    handle.quit(ShutdownReason::UserQuit).await.unwrap();
    let report = with_timeout(LIMIT, running).await.unwrap().unwrap();

    assert_eq!(report.reason, ShutdownReason::UserQuit);
    assert_eq!(report.stop_failures, ["b"]);
    for name in ["a", "b", "c"] {
        let sup = fx.registry.get(name).unwrap();
        assert!(!sup.is_live(), "{name} still has a live handle");
        assert_eq!(calls_for(&fx.journal, name).last(), Some(&"stop"));
    }
    assert!(calls_for(&fx.journal, "lint").is_empty());

    // The session is gone; its handle says so.
    assert!(handle.is_closed());
    assert!(matches!(
        handle.restart("a").await,
        Err(CozyError::Other(_))
    ));
}

#[tokio::test]
async fn every_command_gets_a_subscriber_and_liveness_reports() {
    init_tracing();
    let fx = fixture("");
    let session = ParallelSession::new(
        &fx.registry,
        &fx.workflow,
        fx.dashboard.clone(),
        fast_options(),
    )
    .unwrap();
    let handle = session.handle();
    let running = tokio::spawn(session.run());

    let dash = fx.dashboard.clone();
    let reported = eventually(LIMIT, || async {
        ["a", "b", "c"].iter().all(|n| dash.reported(n).contains(&true))
    })
    .await;
    assert!(reported, "liveness was never reported for every command");

    for name in ["a", "b", "c"] {
        let calls = calls_for(&fx.journal, name);
        assert_eq!(&calls[..2], ["track_log", "start"]);
        assert!(fx.registry.get(name).unwrap().has_subscriber());
        assert!(!fx.dashboard.lines_for(name).is_empty(), "no launch notice for {name}");
    }

    handle.quit(ShutdownReason::Signal("SIGTERM")).await.unwrap();
    let report = with_timeout(LIMIT, running).await.unwrap().unwrap();
    assert_eq!(report.reason, ShutdownReason::Signal("SIGTERM"));
    assert!(report.stop_failures.is_empty());
}

#[tokio::test]
async fn dashboard_requests_reach_the_named_command() {
    init_tracing();
    let fx = fixture("");
    let session = ParallelSession::new(
        &fx.registry,
        &fx.workflow,
        fx.dashboard.clone(),
        fast_options(),
    )
    .unwrap();
    let handle = session.handle();
    let running = tokio::spawn(session.run());
    assert!(eventually(LIMIT, || all_live(&fx.registry, &["a", "b", "c"])).await);

    handle.stop("a").await.unwrap();
    let a = fx.registry.get("a").unwrap();
    assert!(eventually(LIMIT, || async { !a.is_live() }).await);

    handle.restart("a").await.unwrap();
    assert!(eventually(LIMIT, || async { a.is_live() }).await);

    // Not in the workflow: ignored.
    handle.send(SessionRequest::Start("lint".into())).await.unwrap();
    handle.start("nope").await.unwrap();

    // Inspect works on any registered command.
    handle.inspect("lint").await.unwrap();
    let dash = fx.dashboard.clone();
    assert!(
        eventually(LIMIT, || async { dash.lines_for("lint:inspect").len() == 2 }).await,
        "inspection output never reached the dashboard"
    );

    handle.quit(ShutdownReason::UserQuit).await.unwrap();
    with_timeout(LIMIT, running).await.unwrap().unwrap();

    assert_eq!(calls_for(&fx.journal, "lint"), ["inspect"]);
    assert_eq!(
        calls_for(&fx.journal, "a"),
        ["track_log", "start", "stop", "restart", "stop"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn shutdown_leaves_no_real_process_behind() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigFileBuilder::new()
        .with_command("api", CommandConfigBuilder::exec("sleep").arg("30").build())
        .with_command("web", CommandConfigBuilder::exec("sleep").arg("30").build())
        .with_workflow("dev", &["api", "web"], true)
        .build();
    let registry = CommandRegistry::from_config(&cfg, dir.path()).unwrap();
    let workflow = Workflow::from_config(&cfg, "dev").unwrap();
    let dashboard = Arc::new(RecordingDashboard::default());

    let session = ParallelSession::new(&registry, &workflow, dashboard, fast_options()).unwrap();
    let handle = session.handle();
    let running = tokio::spawn(session.run());

    let started = eventually(PROCESS_TIMEOUT, || async {
        live_processes(&registry, &["api", "web"]).await == 2
    })
    .await;
    assert!(started, "commands never launched");

    handle.quit(ShutdownReason::Signal("SIGINT")).await.unwrap();
    let report = with_timeout(PROCESS_TIMEOUT, running).await.unwrap().unwrap();

    assert_eq!(report.reason, ShutdownReason::Signal("SIGINT"));
    assert!(report.stop_failures.is_empty(), "{:?}", report.stop_failures);
    assert_eq!(live_processes(&registry, &["api", "web"]).await, 0);
}

#[test]
fn unknown_workflow_member_fails_before_anything_starts() {
    let fx = fixture("");
    let workflow = Workflow::new("dev", ["a", "ghost"], ExecutionMode::Parallel);

    let err = ParallelSession::new(&fx.registry, &workflow, fx.dashboard.clone(), fast_options())
        .unwrap_err();

    assert!(matches!(err, CozyError::UnknownCommand(ref name) if name == "ghost"));
    assert!(fx.journal.lock().unwrap().is_empty());
}
