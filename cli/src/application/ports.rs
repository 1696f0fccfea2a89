//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clawdeploy_common::StepEvent;

use crate::domain::config::ClawdeployConfig;
use crate::domain::connection::ConnectionDescriptor;
use crate::domain::error::{ConnectionError, ExecError};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Result of one command that ran to completion on the remote host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    /// stdout and stderr, interleaved in arrival order.
    pub output: Vec<u8>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

// ── Remote Shell Ports ────────────────────────────────────────────────────────

/// Opens authenticated remote shell sessions.
///
/// Futures are `Send` so a provisioning run can be spawned onto the runtime.
pub trait RemoteConnector: Send + Sync {
    type Session: RemoteSession + 'static;

    /// Open a session, giving up after `timeout`.
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Session, ConnectionError>> + Send;
}

/// One open remote shell session, exclusively owned by a single run.
pub trait RemoteSession: Send {
    /// Run `command` on a fresh exec channel and wait for it to finish.
    ///
    /// A non-zero exit status is an `Ok` result; `Err` means the command's
    /// outcome is unknown (transport loss or timeout).
    fn exec(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<CommandOutput, ExecError>> + Send;

    /// Close the session. Consumes it so it cannot be closed twice.
    fn close(self) -> impl Future<Output = ()> + Send;
}

// ── Asset Ports ───────────────────────────────────────────────────────────────

/// Read-only access to the template files copied onto provisioned hosts.
pub trait TemplateSource {
    /// Return the UTF-8 contents of the asset at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset does not exist or is not UTF-8.
    fn template(&self, path: &str) -> Result<String>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts settings persistence.
pub trait ConfigStore {
    /// Load settings, returning defaults when no file exists.
    fn load(&self) -> Result<ClawdeployConfig>;
    /// Persist settings.
    fn save(&self, config: &ClawdeployConfig) -> Result<()>;
    /// Location of the settings file.
    fn path(&self) -> Result<PathBuf>;
}

// ── Progress Port ─────────────────────────────────────────────────────────────

/// Receives provisioning progress without depending on the Presentation
/// layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// A step started or reached its terminal status.
    fn step_event(&self, event: &StepEvent);
    /// The run's terminator frame arrived.
    fn done(&self);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
