//! Presentation-layer implementations of `ProgressReporter`.
//!
//! - `TerminalReporter` draws one spinner per running step and leaves a
//!   `✓`/`✗` line behind when the step finishes.
//! - `JsonReporter` writes one stream frame per line (NDJSON), ending with
//!   the `[DONE]` terminator.

use std::cell::RefCell;
use std::io::Write as _;

use clawdeploy_common::{StepEvent, StepStatus, StreamFrame};
use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// Without a TTY (or with `--quiet`) no spinner is drawn; started steps are
/// printed as `→` lines instead, and nothing but failures when quiet.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    spinner: RefCell<Option<ProgressBar>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            spinner: RefCell::new(None),
        }
    }

    fn counter(&self, event: &StepEvent) -> String {
        format!("[{}/{}]", event.index + 1, event.total)
            .style(self.ctx.styles.step)
            .to_string()
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step_event(&self, event: &StepEvent) {
        let message = format!("{} {}", self.counter(event), event.command);
        let spinner = self.spinner.borrow_mut().take();
        match event.status {
            StepStatus::Running => {
                if self.ctx.show_progress() {
                    *self.spinner.borrow_mut() = Some(progress::spinner(&message));
                } else if !self.ctx.quiet {
                    println!("  {} {message}", "→".style(self.ctx.styles.info));
                }
            }
            StepStatus::Success => match spinner {
                Some(pb) => progress::finish_ok(&pb, &message),
                None => self.ctx.success(&message),
            },
            StepStatus::Failed => {
                match spinner {
                    Some(pb) => progress::finish_error(&pb, &message),
                    None => self.ctx.error(&message),
                }
                if let Some(reason) = &event.error_message {
                    self.ctx.error(reason);
                }
                if !event.output.trim().is_empty() {
                    self.ctx.output_block(&event.output);
                }
            }
        }
    }

    fn done(&self) {
        if let Some(pb) = self.spinner.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }

    fn warn(&self, message: &str) {
        if let Some(pb) = self.spinner.borrow_mut().take() {
            pb.finish_and_clear();
        }
        self.ctx.warn(message);
    }
}

/// NDJSON reporter for `--json`: every frame on its own stdout line.
#[derive(Debug, Default)]
pub struct JsonReporter;

impl JsonReporter {
    fn write_frame(frame: &StreamFrame) {
        // Serializing a `StepEvent` cannot fail.
        if let Ok(line) = frame.to_line() {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{line}");
            let _ = stdout.flush();
        }
    }
}

impl ProgressReporter for JsonReporter {
    fn step_event(&self, event: &StepEvent) {
        Self::write_frame(&StreamFrame::Step(event.clone()));
    }

    fn done(&self) {
        Self::write_frame(&StreamFrame::Done);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}
