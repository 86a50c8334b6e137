// tests/supervisor_lifecycle.rs
//
// Real-process tests for the supervisor. They rely on `sh` and `sleep`.
#![cfg(unix)]

mod common;
use crate::common::{
    PROCESS_TIMEOUT, eventually, init_tracing, notices, output_lines, recording_handler,
    with_timeout,
};

use std::time::Duration;

use cozy::command::CommandDefinition;
use cozy::exec::{Notice, ProbeResult, ProcessSupervisor, RestartPolicy, SupervisorStatus};

fn sh(name: &str, script: &str) -> ProcessSupervisor {
    ProcessSupervisor::new(name, CommandDefinition::program(".", "sh", ["-c", script]))
}

#[tokio::test]
async fn probe_follows_the_process_until_it_exits() {
    init_tracing();
    let sup = ProcessSupervisor::new("nap", CommandDefinition::program(".", "sleep", ["1"]));

    sup.start().await.unwrap();
    assert_eq!(sup.probe().await, ProbeResult { running: true });
    assert_eq!(sup.status().await, SupervisorStatus::Running);

    let exited = eventually(PROCESS_TIMEOUT, || async { !sup.probe().await.running }).await;
    assert!(exited, "process never reported as exited");

    let settled = eventually(PROCESS_TIMEOUT, || async {
        sup.status().await == SupervisorStatus::Exited(0)
    })
    .await;
    assert!(settled);
    assert_eq!(sup.retry_count().await, 0);
}

#[tokio::test]
async fn failing_command_is_retried_three_times_then_given_up() {
    init_tracing();
    let sup = sh("flaky", "exit 3");
    let (handler, events) = recording_handler();
    sup.track_log(handler);

    sup.start().await.unwrap();
    let gave_up = eventually(PROCESS_TIMEOUT, || async {
        sup.status().await == SupervisorStatus::FailedPermanently
    })
    .await;
    assert!(gave_up, "supervisor never gave up");

    // Nothing else may launch afterwards.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let seen = notices(&events);
    let exits = seen
        .iter()
        .filter(|n| matches!(n, Notice::Exited { code: 3, .. }))
        .count();
    let attempts: Vec<u32> = seen
        .iter()
        .filter_map(|n| match n {
            Notice::Retrying { attempt, max, .. } => {
                assert_eq!(*max, 3);
                Some(*attempt)
            }
            _ => None,
        })
        .collect();
    let gave_up = seen
        .iter()
        .filter(|n| matches!(n, Notice::GaveUp { max: 3, .. }))
        .count();

    assert_eq!(exits, 4, "initial run plus three retries");
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(gave_up, 1);
    assert!(matches!(seen.last(), Some(Notice::GaveUp { .. })));
    assert_eq!(sup.retry_count().await, 3);
    assert!(!sup.has_live_process().await);
}

#[tokio::test]
async fn failure_is_final_when_restarts_are_disabled() {
    init_tracing();
    let sup = ProcessSupervisor::with_policy(
        "once",
        CommandDefinition::program(".", "sh", ["-c", "exit 3"]),
        RestartPolicy::never(),
    );
    let (handler, events) = recording_handler();
    sup.track_log(handler);

    sup.start().await.unwrap();
    let exited = eventually(PROCESS_TIMEOUT, || async {
        sup.status().await == SupervisorStatus::Exited(3)
    })
    .await;
    assert!(exited, "supervisor never settled on the exit code");

    // A retry would have been scheduled by now.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let seen = notices(&events);
    assert_eq!(
        seen.iter()
            .filter(|n| matches!(n, Notice::Exited { code: 3, .. }))
            .count(),
        1
    );
    assert!(
        seen.iter()
            .all(|n| !matches!(n, Notice::Retrying { .. } | Notice::GaveUp { .. })),
        "unexpected restart notices: {seen:?}"
    );
    assert_eq!(sup.status().await, SupervisorStatus::Exited(3));
    assert_eq!(sup.retry_count().await, 0);
    assert!(!sup.has_live_process().await);
}

#[tokio::test]
async fn launch_failure_surfaces_as_exit_minus_one() {
    init_tracing();
    let sup = ProcessSupervisor::new(
        "ghost",
        CommandDefinition::program(".", "cozy-test-no-such-binary", Vec::<String>::new()),
    );
    let (handler, events) = recording_handler();
    sup.track_log(handler);

    // Launch failures are not errors.
    sup.start().await.unwrap();

    let gave_up = eventually(PROCESS_TIMEOUT, || async {
        sup.status().await == SupervisorStatus::FailedPermanently
    })
    .await;
    assert!(gave_up);

    let seen = notices(&events);
    assert!(seen.iter().all(|n| !matches!(n, Notice::Exited { code, .. } if *code != -1)));
    assert_eq!(
        seen.iter()
            .filter(|n| matches!(n, Notice::Exited { code: -1, .. }))
            .count(),
        4
    );
}

#[tokio::test]
async fn restart_relaunches_a_command_that_exited_cleanly() {
    init_tracing();
    let sup = sh("hello", "echo hi");
    let (handler, events) = recording_handler();
    sup.track_log(handler);

    sup.start().await.unwrap();
    assert!(
        eventually(PROCESS_TIMEOUT, || async {
            sup.status().await == SupervisorStatus::Exited(0)
        })
        .await
    );

    sup.restart().await.unwrap();
    let ran_twice = eventually(PROCESS_TIMEOUT, || async {
        output_lines(&events).iter().filter(|l| *l == "hi").count() == 2
    })
    .await;
    assert!(ran_twice, "restart did not relaunch");
    assert!(notices(&events).iter().any(|n| matches!(n, Notice::Restarting { .. })));
}

#[tokio::test]
async fn restart_of_a_running_command_only_stops_it() {
    init_tracing();
    let sup = ProcessSupervisor::new("long", CommandDefinition::program(".", "sleep", ["30"]));

    sup.start().await.unwrap();
    assert!(sup.probe().await.running);

    with_timeout(PROCESS_TIMEOUT, sup.restart()).await.unwrap();

    assert_eq!(sup.status().await, SupervisorStatus::Stopped);
    assert!(!sup.has_live_process().await);
    assert!(!sup.probe().await.running);

    // Stopping again is harmless.
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn start_replaces_a_live_process() {
    init_tracing();
    let sup = ProcessSupervisor::new("long", CommandDefinition::program(".", "sleep", ["30"]));

    sup.start().await.unwrap();
    let first = sup.pid().await;
    with_timeout(PROCESS_TIMEOUT, sup.start()).await.unwrap();
    let second = sup.pid().await;

    assert!(first.is_some() && second.is_some());
    assert_ne!(first, second);
    assert!(sup.probe().await.running);

    sup.stop().await.unwrap();
    assert_eq!(sup.status().await, SupervisorStatus::Stopped);
}

#[tokio::test]
async fn stop_does_not_trigger_a_retry() {
    init_tracing();
    let sup = ProcessSupervisor::new("long", CommandDefinition::program(".", "sleep", ["30"]));
    let (handler, events) = recording_handler();
    sup.track_log(handler);

    sup.start().await.unwrap();
    with_timeout(PROCESS_TIMEOUT, sup.stop()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let seen = notices(&events);
    assert!(seen.iter().any(|n| matches!(n, Notice::Stopping { .. })));
    assert!(!seen.iter().any(|n| matches!(n, Notice::Retrying { .. })));
    assert_eq!(sup.retry_count().await, 0);
    assert!(!sup.probe().await.running);
}

#[cfg(target_os = "linux")]
fn is_alive(pid: u32) -> bool {
    // A zombie waiting to be reaped counts as dead.
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X"),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn stop_kills_background_grandchildren() {
    init_tracing();
    let sup = sh("tree", "sleep 30 & echo $!; wait");
    let (handler, events) = recording_handler();
    sup.track_log(handler);

    sup.start().await.unwrap();
    let got_pid = eventually(PROCESS_TIMEOUT, || async { !output_lines(&events).is_empty() }).await;
    assert!(got_pid, "grandchild pid was never printed");

    let grandchild: u32 = output_lines(&events)[0].trim().parse().unwrap();
    assert!(is_alive(grandchild));

    with_timeout(PROCESS_TIMEOUT, sup.stop()).await.unwrap();

    let dead = eventually(Duration::from_secs(2), || async { !is_alive(grandchild) }).await;
    assert!(dead, "grandchild {grandchild} survived stop()");
}

#[tokio::test]
async fn replaced_subscriber_receives_nothing_more() {
    init_tracing();
    let sup = sh("ticker", "while true; do echo tick; sleep 0.05; done");
    let (first, first_seen) = recording_handler();
    let (second, second_seen) = recording_handler();

    sup.track_log(first);
    sup.start().await.unwrap();
    assert!(eventually(PROCESS_TIMEOUT, || async { !output_lines(&first_seen).is_empty() }).await);

    sup.track_log(second);
    // Lines are delivered in order by one reader, so once the new subscriber
    // has seen output the old one is done.
    assert!(eventually(PROCESS_TIMEOUT, || async { !output_lines(&second_seen).is_empty() }).await);
    let frozen = first_seen.lock().unwrap().len();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(first_seen.lock().unwrap().len(), frozen);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn one_shot_run_is_independent_of_supervision() {
    init_tracing();
    let sup = sh("once", "echo once");

    let report = sup.run_to_completion().await.unwrap();
    assert_eq!(report.output, "once\n");
    assert_eq!(report.code, 0);
    assert_eq!(sup.status().await, SupervisorStatus::Idle);
    assert!(!sup.has_live_process().await);
}
