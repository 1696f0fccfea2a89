//! Application service: remote provisioning executor.
//!
//! Runs a `CommandSequence` over one remote session, strictly in order, and
//! streams a `StepEvent` per step transition to a single consumer.
//!
//! The frame channel holds one frame and a step starts only once the consumer
//! has taken its `running` frame, so the run never gets ahead of its reader.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use clawdeploy_common::{StepEvent, StepStatus, StreamFrame};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{ProgressReporter, RemoteConnector, RemoteSession};
use crate::application::services::CONNECT_GRACE;
use crate::domain::config::ClawdeployConfig;
use crate::domain::connection::ConnectionDescriptor;
use crate::domain::error::{ConnectionError, ExecError};
use crate::domain::redact::{DEFAULT_OUTPUT_TAIL_BYTES, Redactor, exit_failure_message};
use crate::domain::sequence::CommandSequence;

/// Time ceilings and output bounds for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub connect_timeout: Duration,
    /// Ceiling for each command; `None` lets a command run indefinitely.
    pub command_timeout: Option<Duration>,
    /// Ceiling for the whole run, measured from the first command.
    pub run_timeout: Option<Duration>,
    pub output_tail_bytes: usize,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            command_timeout: None,
            run_timeout: None,
            output_tail_bytes: DEFAULT_OUTPUT_TAIL_BYTES,
        }
    }
}

impl From<&ClawdeployConfig> for ProvisionOptions {
    fn from(config: &ClawdeployConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            command_timeout: config.command_timeout(),
            run_timeout: config.run_timeout(),
            output_tail_bytes: config.execution.output_tail_bytes,
        }
    }
}

/// Everything one run needs. Discarded when the run ends.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub descriptor: ConnectionDescriptor,
    pub commands: CommandSequence,
    /// Secret values masked in every label and output tail.
    pub redactions: Vec<String>,
}

/// How a run ended. Returned through [`ProvisionStream::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every command exited 0.
    Completed { steps: usize },
    /// The step at `index` failed; later steps never started.
    Aborted { index: usize, reason: String },
    /// The session could not be opened; no command ran.
    ConnectFailed(String),
    /// The consumer went away. `completed` steps were reported.
    Cancelled { completed: usize },
    /// The run task panicked.
    Crashed(String),
}

impl RunOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Consumer side of a running provisioning task.
///
/// Dropping it cancels the run at the next command boundary.
pub struct ProvisionStream {
    frames: Receiver<StreamFrame>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<RunOutcome>>,
}

impl ProvisionStream {
    /// Next frame, or `None` once the producer has gone away.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        self.frames.recv().await
    }

    /// Ask the run to stop at the next command boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run task to end and return its outcome.
    ///
    /// The run waits for its reader, so drain the stream or [`cancel`] first.
    ///
    /// [`cancel`]: Self::cancel
    pub async fn finish(mut self) -> RunOutcome {
        join(self.handle.take()).await
    }

    /// Stop consuming: close the channel, cancel, and wait for cleanup.
    pub async fn abandon(mut self) -> RunOutcome {
        self.frames.close();
        self.cancel.cancel();
        join(self.handle.take()).await
    }
}

impl Drop for ProvisionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn join(handle: Option<JoinHandle<RunOutcome>>) -> RunOutcome {
    match handle {
        Some(handle) => handle
            .await
            .unwrap_or_else(|e| RunOutcome::Crashed(e.to_string())),
        None => RunOutcome::Crashed("run already joined".to_string()),
    }
}

/// Start a provisioning run on the tokio runtime.
///
/// Frames arrive in execution order: `running(i)` then exactly one of
/// `success(i)` / `failed(i)`, and finally [`StreamFrame::Done`] unless the
/// run was cancelled.
pub fn spawn_provisioning<C>(
    connector: C,
    request: ProvisionRequest,
    options: ProvisionOptions,
    cancel: CancellationToken,
) -> ProvisionStream
where
    C: RemoteConnector + 'static,
    C::Session: Sync,
{
    let (tx, rx) = mpsc::channel(1);
    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        run_provisioning(&connector, request, options, &task_cancel, &tx).await
    });
    ProvisionStream {
        frames: rx,
        cancel,
        handle: Some(handle),
    }
}

/// Drive one run to a terminal state on the current task.
///
/// Emits into `tx` and waits for a reader, so `tx` must be drained
/// concurrently. Never returns an error. The session is closed on every path
/// once it has been opened.
pub async fn run_provisioning<C: RemoteConnector>(
    connector: &C,
    request: ProvisionRequest,
    options: ProvisionOptions,
    cancel: &CancellationToken,
    tx: &Sender<StreamFrame>,
) -> RunOutcome {
    let ProvisionRequest {
        descriptor,
        commands,
        redactions,
    } = request;
    let redactor = Redactor::new(redactions);
    let total = commands.len();
    let target = descriptor.target();

    info!(host = %target, total, "connecting");
    let connect = connector.connect(&descriptor, options.connect_timeout);
    let attempt = tokio::time::timeout(options.connect_timeout + CONNECT_GRACE, connect)
        .await
        .unwrap_or_else(|_| {
            Err(ConnectionError::TimedOut {
                addr: descriptor.address(),
                timeout: options.connect_timeout,
            })
        });
    let mut session = match attempt {
        Ok(session) => session,
        Err(err) => {
            warn!(host = %target, error = %err, "connection failed");
            let label = redactor.label(&format!("connect {target}"));
            let event = StepEvent::failed(0, total, label, "", err.to_string());
            if deliver(tx, cancel, StreamFrame::Step(event)).await {
                deliver(tx, cancel, StreamFrame::Done).await;
            }
            return RunOutcome::ConnectFailed(err.to_string());
        }
    };

    let mut run = Run {
        session: &mut session,
        commands: &commands,
        redactor: &redactor,
        options,
        cancel,
        tx,
    };
    let outcome = run.execute().await;

    session.close().await;
    debug!(host = %target, "session closed");

    match &outcome {
        RunOutcome::Cancelled { completed } => {
            info!(host = %target, completed, "run cancelled");
        }
        RunOutcome::Aborted { index, reason } => {
            warn!(host = %target, index, reason = %reason, "run aborted");
            deliver(tx, cancel, StreamFrame::Done).await;
        }
        _ => {
            info!(host = %target, total, "run completed");
            deliver(tx, cancel, StreamFrame::Done).await;
        }
    }
    outcome
}

struct Run<'a, S> {
    session: &'a mut S,
    commands: &'a CommandSequence,
    redactor: &'a Redactor,
    options: ProvisionOptions,
    cancel: &'a CancellationToken,
    tx: &'a Sender<StreamFrame>,
}

impl<S: RemoteSession> Run<'_, S> {
    fn abandoned(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    async fn emit(&self, event: StepEvent) -> bool {
        deliver(self.tx, self.cancel, StreamFrame::Step(event)).await
    }

    async fn execute(&mut self) -> RunOutcome {
        let total = self.commands.len();
        let started = Instant::now();

        for (index, command) in self.commands.iter().enumerate() {
            if self.abandoned() {
                return RunOutcome::Cancelled { completed: index };
            }

            let label = self.redactor.label(command);
            if !self.emit(StepEvent::running(index, total, label.clone())).await
                || !handed_over(self.tx, self.cancel).await
            {
                return RunOutcome::Cancelled { completed: index };
            }

            let remaining = match self.options.run_timeout {
                Some(limit) => match limit.checked_sub(started.elapsed()) {
                    Some(rem) if !rem.is_zero() => Some(rem),
                    _ => {
                        let reason = format!("run timed out after {}s", limit.as_secs());
                        let event = StepEvent::failed(index, total, label, "", reason.clone());
                        if !self.emit(event).await {
                            return RunOutcome::Cancelled { completed: index };
                        }
                        return RunOutcome::Aborted { index, reason };
                    }
                },
                None => None,
            };
            let timeout = match (self.options.command_timeout, remaining) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            debug!(index, command = %label, "running step");
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, self.session.exec(command, Some(limit)))
                    .await
                    .unwrap_or(Err(ExecError::TimedOut(limit))),
                None => self.session.exec(command, None).await,
            };

            // Result of a step that was in flight when the consumer left is dropped.
            if self.abandoned() {
                return RunOutcome::Cancelled { completed: index };
            }

            let event = match result {
                Ok(out) => {
                    let output = self
                        .redactor
                        .output_tail(&out.output, self.options.output_tail_bytes);
                    debug!(index, exit_status = out.exit_status, "step finished");
                    if out.success() {
                        StepEvent::success(index, total, label, output)
                    } else {
                        let message = exit_failure_message(out.exit_status, &output);
                        StepEvent::failed(index, total, label, output, message)
                            .with_exit_status(out.exit_status)
                    }
                }
                Err(err) => {
                    warn!(index, error = %err, "step did not complete");
                    StepEvent::failed(index, total, label, "", err.to_string())
                }
            };

            let failure = (event.status == StepStatus::Failed)
                .then(|| event.error_message.clone().unwrap_or_default());
            if !self.emit(event).await {
                return RunOutcome::Cancelled { completed: index };
            }
            if let Some(reason) = failure {
                return RunOutcome::Aborted { index, reason };
            }
        }

        RunOutcome::Completed { steps: total }
    }
}

/// Queue `frame` for the consumer. `false` if the run was cancelled or the
/// consumer went away first.
async fn deliver(tx: &Sender<StreamFrame>, cancel: &CancellationToken, frame: StreamFrame) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(frame) => sent.is_ok(),
    }
}

/// Wait until the consumer has taken the queued frame.
async fn handed_over(tx: &Sender<StreamFrame>, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        permit = tx.reserve() => permit.is_ok(),
    }
}

// ── Consumer side ─────────────────────────────────────────────────────────────

/// What a consumer observed on the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    /// The terminal failure event, if any.
    pub failure: Option<StepEvent>,
    /// `true` when the terminator arrived.
    pub terminated: bool,
}

impl RunSummary {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.terminated && self.failure.is_none()
    }
}

/// Forward every frame to `reporter` until the terminator or end of stream.
///
/// A stream that ends without the terminator was cancelled or lost its
/// producer; `RunSummary::terminated` stays `false`.
pub async fn consume(stream: &mut ProvisionStream, reporter: &impl ProgressReporter) -> RunSummary {
    let mut summary = RunSummary::default();
    while let Some(frame) = stream.next_frame().await {
        match frame {
            StreamFrame::Step(event) => {
                summary.total = event.total;
                match event.status {
                    StepStatus::Success => summary.succeeded += 1,
                    StepStatus::Failed => summary.failure = Some(event.clone()),
                    StepStatus::Running => {}
                }
                reporter.step_event(&event);
            }
            StreamFrame::Done => {
                summary.terminated = true;
                reporter.done();
                break;
            }
        }
    }
    summary
}
