//! Provisioning executor: event ordering, failure handling, cancellation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;
use std::time::Duration;

use clawdeploy_cli::application::ports::ProgressReporter;
use clawdeploy_cli::application::services::provision::{
    ProvisionOptions, ProvisionRequest, RunOutcome, consume, run_provisioning, spawn_provisioning,
};
use clawdeploy_cli::domain::error::{ConnectionError, ExecError};
use clawdeploy_cli::domain::redact::MASK;
use clawdeploy_cli::domain::sequence::CommandSequence;
use clawdeploy_common::{StepEvent, StepStatus, StreamFrame};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::helpers::{
    FakeConnector, Scripted, collect, descriptor, eventually, exit, ok, steps,
};

const DEADLINE: Duration = Duration::from_secs(5);

fn request(commands: &[&str]) -> ProvisionRequest {
    ProvisionRequest {
        descriptor: descriptor(),
        commands: commands.iter().map(|c| (*c).to_string()).collect(),
        redactions: Vec::new(),
    }
}

fn statuses(frames: &[StreamFrame]) -> Vec<(usize, StepStatus)> {
    steps(frames).iter().map(|e| (e.index, e.status)).collect()
}

/// Spawn a run and drain it, bounded by [`DEADLINE`].
async fn run_to_end(
    connector: &FakeConnector,
    request: ProvisionRequest,
    options: ProvisionOptions,
) -> (Vec<StreamFrame>, RunOutcome) {
    let mut stream = spawn_provisioning(
        connector.clone(),
        request,
        options,
        CancellationToken::new(),
    );
    let frames = tokio::time::timeout(DEADLINE, collect(&mut stream))
        .await
        .expect("run finished in time");
    let outcome = stream.finish().await;
    (frames, outcome)
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_all_commands_succeed_emits_running_then_success_per_step() {
    let connector = FakeConnector::scripted([ok("a\n"), ok("b\n"), ok("c\n")]);
    let (frames, outcome) = run_to_end(
        &connector,
        request(&["echo a", "echo b", "echo c"]),
        ProvisionOptions::default(),
    )
    .await;

    assert_eq!(
        statuses(&frames),
        vec![
            (0, StepStatus::Running),
            (0, StepStatus::Success),
            (1, StepStatus::Running),
            (1, StepStatus::Success),
            (2, StepStatus::Running),
            (2, StepStatus::Success),
        ]
    );
    assert_eq!(frames.last(), Some(&StreamFrame::Done));
    assert_eq!(frames.iter().filter(|f| f.is_done()).count(), 1);
    assert!(steps(&frames).iter().all(|e| e.total == 3));
    assert_eq!(steps(&frames)[1].output, "a\n");
    assert_eq!(steps(&frames)[1].exit_status, Some(0));
    assert_eq!(outcome, RunOutcome::Completed { steps: 3 });
    assert_eq!(connector.executed(), vec!["echo a", "echo b", "echo c"]);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_empty_sequence_emits_only_done() {
    let connector = FakeConnector::scripted([]);
    let (frames, outcome) =
        run_to_end(&connector, request(&[]), ProvisionOptions::default()).await;

    assert_eq!(frames, vec![StreamFrame::Done]);
    assert_eq!(outcome, RunOutcome::Completed { steps: 0 });
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_rerunning_identical_sequence_runs_every_command_again() {
    let commands = ["mkdir -p /opt/x", "apt-get install -y curl"];
    for _ in 0..2 {
        let connector = FakeConnector::scripted([]);
        let (frames, outcome) =
            run_to_end(&connector, request(&commands), ProvisionOptions::default()).await;
        assert!(outcome.is_success());
        assert_eq!(steps(&frames).len(), 4);
        assert_eq!(connector.executed(), commands);
    }
}

// ── Command failure ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_zero_exit_aborts_with_output_excerpt() {
    let connector = FakeConnector::scripted([
        ok(""),
        ok(""),
        exit(1, "ls: cannot access '/nope': No such file or directory\n"),
    ]);
    let (frames, outcome) = run_to_end(
        &connector,
        request(&["true", "true", "ls /nope", "echo never"]),
        ProvisionOptions::default(),
    )
    .await;

    assert_eq!(
        statuses(&frames),
        vec![
            (0, StepStatus::Running),
            (0, StepStatus::Success),
            (1, StepStatus::Running),
            (1, StepStatus::Success),
            (2, StepStatus::Running),
            (2, StepStatus::Failed),
        ]
    );
    assert_eq!(frames.last(), Some(&StreamFrame::Done));

    let failed = steps(&frames)[5];
    assert_eq!(failed.exit_status, Some(1));
    let message = failed.error_message.as_deref().expect("error message");
    assert!(message.starts_with("exit status 1"), "got: {message}");
    assert!(message.contains("No such file or directory"), "got: {message}");
    assert!(failed.output.contains("No such file"));

    assert!(matches!(outcome, RunOutcome::Aborted { index: 2, .. }));
    assert_eq!(connector.executed().len(), 3);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_failure_at_first_step_runs_nothing_else() {
    let connector = FakeConnector::scripted([exit(127, "")]);
    let (frames, outcome) = run_to_end(
        &connector,
        request(&["nosuchcmd", "echo b", "echo c"]),
        ProvisionOptions::default(),
    )
    .await;

    let events = steps(&frames);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.index == 0));
    assert_eq!(events[1].error_message.as_deref(), Some("exit status 127"));
    assert_eq!(
        outcome,
        RunOutcome::Aborted {
            index: 0,
            reason: "exit status 127".to_string()
        }
    );
    assert_eq!(connector.executed(), vec!["nosuchcmd"]);
}

#[tokio::test]
async fn test_transport_loss_is_reported_as_connection_lost() {
    let connector = FakeConnector::scripted([
        ok(""),
        Scripted::Fail(ExecError::Transport("broken pipe".to_string())),
    ]);
    let (frames, outcome) = run_to_end(
        &connector,
        request(&["true", "docker compose build", "true"]),
        ProvisionOptions::default(),
    )
    .await;

    let failed = *steps(&frames).last().expect("failed event");
    assert_eq!(failed.index, 1);
    assert_eq!(failed.status, StepStatus::Failed);
    assert_eq!(failed.exit_status, None);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("connection lost: broken pipe")
    );
    assert!(matches!(outcome, RunOutcome::Aborted { index: 1, .. }));
    assert_eq!(connector.closes(), 1);
}

// ── Connection failure ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_failure_emits_single_failed_event_at_index_zero() {
    let connector = FakeConnector::refusing(ConnectionError::AuthRejected {
        user: "root".to_string(),
        reason: "password rejected".to_string(),
    });
    let (frames, outcome) = run_to_end(
        &connector,
        request(&["echo a", "echo b", "echo c"]),
        ProvisionOptions::default(),
    )
    .await;

    assert_eq!(frames.len(), 2);
    let event = frames[0].as_step().expect("step event");
    assert_eq!(event.index, 0);
    assert_eq!(event.total, 3);
    assert_eq!(event.status, StepStatus::Failed);
    assert_eq!(event.command, "connect root@10.0.0.5:22");
    assert!(
        event
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("authentication rejected"))
    );
    assert_eq!(frames[1], StreamFrame::Done);

    assert!(matches!(outcome, RunOutcome::ConnectFailed(_)));
    assert!(connector.executed().is_empty());
    assert_eq!(connector.closes(), 0);
}

#[tokio::test]
async fn test_hanging_connect_is_bounded_by_connect_timeout_plus_grace() {
    let connector = FakeConnector::hanging();
    let options = ProvisionOptions {
        connect_timeout: Duration::from_millis(100),
        ..ProvisionOptions::default()
    };
    let (frames, outcome) = run_to_end(&connector, request(&["echo a"]), options).await;

    let event = frames[0].as_step().expect("step event");
    assert_eq!(event.status, StepStatus::Failed);
    assert!(
        event
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("timed out")),
        "got: {event:?}"
    );
    assert_eq!(frames.last(), Some(&StreamFrame::Done));
    assert!(matches!(outcome, RunOutcome::ConnectFailed(_)));
    assert!(connector.executed().is_empty());
    assert_eq!(connector.closes(), 0);
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_command_timeout_fails_the_hanging_step() {
    let connector = FakeConnector::scripted([ok(""), Scripted::Hang, ok("")]);
    let options = ProvisionOptions {
        command_timeout: Some(Duration::from_millis(50)),
        ..ProvisionOptions::default()
    };
    let (frames, outcome) = run_to_end(
        &connector,
        request(&["true", "sleep infinity", "echo never"]),
        options,
    )
    .await;

    let failed = *steps(&frames).last().expect("failed event");
    assert_eq!(failed.index, 1);
    assert!(
        failed
            .error_message
            .as_deref()
            .is_some_and(|m| m.starts_with("timed out after"))
    );
    assert_eq!(frames.last(), Some(&StreamFrame::Done));
    assert!(matches!(outcome, RunOutcome::Aborted { index: 1, .. }));
    assert_eq!(connector.executed().len(), 2);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_run_timeout_stops_the_sequence() {
    let connector = FakeConnector::scripted([]).with_delay(Duration::from_millis(60));
    let options = ProvisionOptions {
        run_timeout: Some(Duration::from_millis(100)),
        ..ProvisionOptions::default()
    };
    let (frames, outcome) = run_to_end(
        &connector,
        request(&["s1", "s2", "s3", "s4", "s5"]),
        options,
    )
    .await;

    let events = steps(&frames);
    let failed: Vec<&&StepEvent> = events
        .iter()
        .filter(|e| e.status == StepStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    let failed = failed[0];
    assert!(
        failed
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("timed out")),
        "got: {failed:?}"
    );
    assert!(events.iter().all(|e| e.index <= failed.index));
    assert!(matches!(outcome, RunOutcome::Aborted { .. }));
    assert!(connector.executed().len() < 5);
    assert_eq!(connector.closes(), 1);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_stops_at_next_boundary_and_closes_session() {
    let connector = FakeConnector::scripted([]).with_delay(Duration::from_millis(30));
    let commands: Vec<String> = (0..10).map(|i| format!("step {i}")).collect();
    let mut stream = spawn_provisioning(
        connector.clone(),
        ProvisionRequest {
            descriptor: descriptor(),
            commands: CommandSequence::new(commands),
            redactions: Vec::new(),
        },
        ProvisionOptions::default(),
        CancellationToken::new(),
    );

    let mut seen = Vec::new();
    while let Some(frame) = stream.next_frame().await {
        let stop = frame
            .as_step()
            .is_some_and(|e| e.index == 1 && e.status == StepStatus::Success);
        seen.push(frame);
        if stop {
            break;
        }
    }
    stream.cancel();
    let rest = tokio::time::timeout(DEADLINE, collect(&mut stream))
        .await
        .expect("producer stopped");
    let outcome = stream.finish().await;

    assert!(!rest.iter().any(StreamFrame::is_done), "no terminator after cancel");
    for event in steps(&rest) {
        assert_eq!(event.index, 2, "only the in-flight step may appear: {event:?}");
        assert_eq!(event.status, StepStatus::Running);
    }
    assert_eq!(outcome, RunOutcome::Cancelled { completed: 2 });
    assert!(connector.executed().len() <= 3);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_abandon_returns_cancelled_outcome() {
    let connector = FakeConnector::scripted([]).with_delay(Duration::from_millis(30));
    let mut stream = spawn_provisioning(
        connector.clone(),
        request(&["a", "b", "c", "d", "e"]),
        ProvisionOptions::default(),
        CancellationToken::new(),
    );
    let first = stream.next_frame().await.expect("first frame");
    assert_eq!(first.as_step().map(|e| e.status), Some(StepStatus::Running));

    let outcome = tokio::time::timeout(DEADLINE, stream.abandon())
        .await
        .expect("abandon finished");

    assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
    assert!(connector.executed().len() < 5);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_dropping_stream_cancels_run_and_closes_session() {
    let connector = FakeConnector::scripted([]).with_delay(Duration::from_millis(30));
    let mut stream = spawn_provisioning(
        connector.clone(),
        request(&["a", "b", "c", "d", "e", "f", "g", "h"]),
        ProvisionOptions::default(),
        CancellationToken::new(),
    );
    let _ = stream.next_frame().await;
    drop(stream);

    let observer = connector.clone();
    assert!(eventually(|| observer.closes() == 1).await, "session was not closed");
    assert!(connector.executed().len() < 8);
}

// ── Slow consumer ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_next_step_waits_for_consumer_to_take_success() {
    let connector = FakeConnector::scripted([]);
    let mut stream = spawn_provisioning(
        connector.clone(),
        request(&["s0", "s1", "s2", "s3", "s4"]),
        ProvisionOptions::default(),
        CancellationToken::new(),
    );

    let mut frames = Vec::new();
    while let Some(frame) = stream.next_frame().await {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if let Some(event) = frame.as_step() {
            let ran = connector.executed().len();
            match event.status {
                StepStatus::Running => assert!(ran <= event.index + 1, "{ran} ran at {event:?}"),
                _ => assert_eq!(ran, event.index + 1, "step {} began early", event.index + 1),
            }
        }
        frames.push(frame);
    }

    assert_eq!(steps(&frames).len(), 10);
    assert_eq!(frames.last(), Some(&StreamFrame::Done));
    assert_eq!(stream.finish().await, RunOutcome::Completed { steps: 5 });
}

#[tokio::test]
async fn test_lagging_consumer_that_leaves_stops_the_run() {
    let connector = FakeConnector::scripted([]);
    let commands: Vec<String> = (0..10).map(|i| format!("step {i}")).collect();
    let mut stream = spawn_provisioning(
        connector.clone(),
        ProvisionRequest {
            descriptor: descriptor(),
            commands: CommandSequence::new(commands),
            redactions: Vec::new(),
        },
        ProvisionOptions::default(),
        CancellationToken::new(),
    );

    let running = stream.next_frame().await.expect("running(0)");
    assert_eq!(running.as_step().map(|e| e.status), Some(StepStatus::Running));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connector.executed().len(), 1);

    let success = stream.next_frame().await.expect("success(0)");
    assert_eq!(success.as_step().map(|e| (e.index, e.status)), Some((0, StepStatus::Success)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connector.executed().len(), 1, "step 1 began before running(1) was read");

    let outcome = tokio::time::timeout(DEADLINE, stream.abandon())
        .await
        .expect("abandon finished");

    assert_eq!(outcome, RunOutcome::Cancelled { completed: 1 });
    assert!(connector.executed().len() <= 2);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_cancel_without_draining_does_not_block_the_run() {
    let connector = FakeConnector::scripted([]);
    let mut stream = spawn_provisioning(
        connector.clone(),
        request(&["a", "b", "c"]),
        ProvisionOptions::default(),
        CancellationToken::new(),
    );
    let _ = stream.next_frame().await;
    stream.cancel();

    let outcome = tokio::time::timeout(DEADLINE, stream.finish())
        .await
        .expect("run stopped");

    assert!(matches!(outcome, RunOutcome::Cancelled { completed } if completed <= 1));
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_external_token_cancels_before_first_command() {
    let connector = FakeConnector::scripted([]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let stream = spawn_provisioning(
        connector.clone(),
        request(&["a", "b"]),
        ProvisionOptions::default(),
        cancel,
    );

    let outcome = stream.finish().await;

    assert_eq!(outcome, RunOutcome::Cancelled { completed: 0 });
    assert!(connector.executed().is_empty());
    assert_eq!(connector.closes(), 1);
}

// ── Redaction and output bounds ──────────────────────────────────────────────

#[tokio::test]
async fn test_secrets_never_reach_events() {
    let secret = "sk-or-v1-abcdef";
    let connector = FakeConnector::scripted([exit(2, &format!("bad key {secret}\n"))]);
    let (frames, _) = run_to_end(
        &connector,
        ProvisionRequest {
            descriptor: descriptor(),
            commands: CommandSequence::new(vec![format!("echo {secret} > /opt/.env")]),
            redactions: vec![secret.to_string()],
        },
        ProvisionOptions::default(),
    )
    .await;

    for event in steps(&frames) {
        let line = StreamFrame::Step(event.clone()).to_line().expect("encodes");
        assert!(!line.contains(secret), "leaked: {line}");
    }
    let failed = steps(&frames)[1];
    assert!(failed.command.contains(MASK));
    assert!(failed.output.contains(MASK));
    // The remote shell still received the real value.
    assert_eq!(connector.executed(), vec![format!("echo {secret} > /opt/.env")]);
}

#[tokio::test]
async fn test_multiline_command_label_is_first_line() {
    let connector = FakeConnector::scripted([]);
    let (frames, _) = run_to_end(
        &connector,
        request(&["cat > /opt/x << 'EOF'\nline\nEOF"]),
        ProvisionOptions::default(),
    )
    .await;

    let label = &steps(&frames)[0].command;
    assert!(label.starts_with("cat > /opt/x << 'EOF'"));
    assert!(!label.contains('\n'));
}

#[tokio::test]
async fn test_output_is_bounded_to_configured_tail() {
    let big = "x".repeat(1000);
    let connector = FakeConnector::scripted([ok(&big)]);
    let options = ProvisionOptions {
        output_tail_bytes: 64,
        ..ProvisionOptions::default()
    };
    let (frames, _) = run_to_end(&connector, request(&["yes | head"]), options).await;

    let output = &steps(&frames)[1].output;
    assert!(output.starts_with("[... 936 bytes truncated]\n"), "got: {output}");
    assert!(output.ends_with(&"x".repeat(64)));
}

// ── Direct run and consumer ──────────────────────────────────────────────────

#[derive(Default)]
struct RecordingReporter {
    events: RefCell<Vec<StepEvent>>,
    done: RefCell<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn step_event(&self, event: &StepEvent) {
        self.events.borrow_mut().push(event.clone());
    }
    fn done(&self) {
        *self.done.borrow_mut() += 1;
    }
    fn warn(&self, _message: &str) {}
}

#[tokio::test]
async fn test_run_provisioning_on_current_task() {
    let connector = FakeConnector::scripted([]);
    let (tx, mut rx) = mpsc::channel::<StreamFrame>(1);
    let reader = async {
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            let done = frame.is_done();
            frames.push(frame);
            if done {
                break;
            }
        }
        frames
    };
    let cancel = CancellationToken::new();
    let (outcome, frames) = tokio::join!(
        run_provisioning(
            &connector,
            request(&["a", "b"]),
            ProvisionOptions::default(),
            &cancel,
            &tx,
        ),
        reader,
    );

    assert_eq!(outcome, RunOutcome::Completed { steps: 2 });
    assert_eq!(frames.len(), 5);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_consume_summarizes_successful_run() {
    let connector = FakeConnector::scripted([]);
    let mut stream = spawn_provisioning(
        connector,
        request(&["a", "b", "c"]),
        ProvisionOptions::default(),
        CancellationToken::new(),
    );
    let reporter = RecordingReporter::default();

    let summary = consume(&mut stream, &reporter).await;

    assert!(summary.is_success());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(reporter.events.borrow().len(), 6);
    assert_eq!(*reporter.done.borrow(), 1);
}

#[tokio::test]
async fn test_consume_keeps_terminal_failure() {
    let connector = FakeConnector::scripted([ok(""), exit(3, "boom\n")]);
    let mut stream = spawn_provisioning(
        connector,
        request(&["a", "b", "c"]),
        ProvisionOptions::default(),
        CancellationToken::new(),
    );
    let reporter = RecordingReporter::default();

    let summary = consume(&mut stream, &reporter).await;

    assert!(!summary.is_success());
    assert!(summary.terminated);
    assert_eq!(summary.succeeded, 1);
    let failure = summary.failure.expect("failure recorded");
    assert_eq!(failure.index, 1);
    assert_eq!(failure.error_message.as_deref(), Some("exit status 3: boom"));
}
