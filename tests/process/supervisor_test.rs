//! Tests for spawning and controlling real worker processes.

use std::time::Duration;

use scrape_supervisor::process::{
    EventSink, ProcessSupervisor, SpawnError, WorkerCommand, WorkerInput,
};
use scrape_supervisor::protocol::{Event, InputKind};

use crate::support::{collect_until_completed, plain_lines, sh, TEST_TIMEOUT};

fn completed(events: &[Event]) -> Option<&Event> {
    events.iter().find(|e| e.is_terminal())
}

#[tokio::test]
async fn missing_binary_is_not_found() {
    let (tx, _sink) = EventSink::channel();
    let command = WorkerCommand::new("/nonexistent/scraper-worker");
    match ProcessSupervisor::start(&command, tx) {
        Err(SpawnError::NotFound(program)) => assert!(program.contains("scraper-worker")),
        other => panic!("Expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn events_arrive_in_output_order() {
    let (tx, mut sink) = EventSink::channel();
    let script = "echo BYTES_DOWNLOADED:100; echo hello; echo GUI_NEEDS_INPUT:PHONE";
    let mut sup = ProcessSupervisor::start(&sh(script), tx).unwrap();

    let events = collect_until_completed(&mut sink).await;
    assert_eq!(
        events,
        vec![
            Event::ByteProgress { n: 100 },
            Event::PlainLine {
                text: "hello".to_string()
            },
            Event::InputRequest {
                kind: InputKind::Phone
            },
            Event::Completed {
                exit_code: Some(0),
                stopped_by_user: false
            },
        ]
    );
    sup.wait().await.unwrap();
    assert!(!sup.is_alive());
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let (tx, mut sink) = EventSink::channel();
    let _sup = ProcessSupervisor::start(&sh("echo failing; exit 3"), tx).unwrap();

    let events = collect_until_completed(&mut sink).await;
    assert_eq!(
        completed(&events),
        Some(&Event::Completed {
            exit_code: Some(3),
            stopped_by_user: false
        })
    );
}

#[tokio::test]
async fn stderr_lines_are_classified_too() {
    let (tx, mut sink) = EventSink::channel();
    let _sup =
        ProcessSupervisor::start(&sh("echo GUI_AUTH_FAILED:bad code >&2; echo out"), tx).unwrap();

    let events = collect_until_completed(&mut sink).await;
    assert!(events.contains(&Event::AuthFailure {
        reason: "bad code".to_string()
    }));
    assert_eq!(plain_lines(&events), vec!["out".to_string()]);
}

#[tokio::test]
async fn written_line_reaches_worker() {
    let (tx, mut sink) = EventSink::channel();
    let mut sup =
        ProcessSupervisor::start(&sh("read line; echo \"got:$line\""), tx).unwrap();

    assert!(sup.write_line("+15550100").await);
    let events = collect_until_completed(&mut sink).await;
    assert_eq!(plain_lines(&events), vec!["got:+15550100".to_string()]);
}

#[tokio::test]
async fn empty_write_sends_bare_newline() {
    let (tx, mut sink) = EventSink::channel();
    let mut sup =
        ProcessSupervisor::start(&sh("read line; echo \"got:[$line]\""), tx).unwrap();

    assert!(sup.write("").await);
    let events = collect_until_completed(&mut sink).await;
    assert_eq!(plain_lines(&events), vec!["got:[]".to_string()]);
}

#[tokio::test]
async fn write_after_exit_fails_quietly() {
    let (tx, mut sink) = EventSink::channel();
    let mut sup = ProcessSupervisor::start(&sh("exit 0"), tx).unwrap();

    collect_until_completed(&mut sink).await;
    sup.wait().await.unwrap();
    assert!(!sup.write("late").await);
}

#[tokio::test]
async fn terminate_stops_worker_and_is_idempotent() {
    let (tx, mut sink) = EventSink::channel();
    let mut sup = ProcessSupervisor::start(&sh("exec sleep 30"), tx).unwrap();
    assert!(sup.is_alive());

    assert!(sup.terminate());
    assert!(!sup.terminate());
    assert!(sup.termination_requested());

    let events = collect_until_completed(&mut sink).await;
    match completed(&events) {
        Some(Event::Completed {
            stopped_by_user, ..
        }) => assert!(stopped_by_user),
        other => panic!("Expected Completed, got {other:?}"),
    }
    tokio::time::timeout(TEST_TIMEOUT, sup.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(!sup.is_alive());
}

#[tokio::test]
async fn worker_ignoring_sigterm_is_killed() {
    let (tx, mut sink) = EventSink::channel();
    let script = "trap '' TERM; echo ready; while :; do sleep 0.1; done";
    let sup =
        ProcessSupervisor::start_with_timeout(&sh(script), tx, Duration::from_millis(200)).unwrap();

    let first = sink.next_batch(TEST_TIMEOUT).await;
    assert_eq!(plain_lines(&first), vec!["ready".to_string()]);

    assert!(sup.terminate());
    let events = collect_until_completed(&mut sink).await;
    match completed(&events) {
        Some(Event::Completed {
            exit_code,
            stopped_by_user,
        }) => {
            assert!(stopped_by_user);
            assert_eq!(*exit_code, None);
        }
        other => panic!("Expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn completed_is_the_last_event() {
    let (tx, mut sink) = EventSink::channel();
    let _sup = ProcessSupervisor::start(&sh("echo a; echo b >&2; echo c"), tx).unwrap();

    let events = collect_until_completed(&mut sink).await;
    assert!(events.last().is_some_and(Event::is_terminal));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn worker_runs_in_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let command = sh("pwd -P").working_dir(&root);
    assert_eq!(command.get_working_dir(), Some(&root));

    let (tx, mut sink) = EventSink::channel();
    let _sup = ProcessSupervisor::start(&command, tx).unwrap();
    let events = collect_until_completed(&mut sink).await;
    assert_eq!(plain_lines(&events), vec![root.display().to_string()]);
}
