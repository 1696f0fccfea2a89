use std::fmt;

use serde::{Deserialize, Serialize};

/// How the remote shell session authenticates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Password,
    Key,
}

/// Spending autonomy granted to the deployed agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyLevel {
    Conservative,
    #[default]
    Balanced,
    Autonomous,
}

impl AutonomyLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Autonomous => "autonomous",
        }
    }
}

/// Chain network the agent operates on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

/// Lifecycle status carried by a [`StepEvent`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Success,
    Failed,
}

impl StepStatus {
    /// `true` for `success` and `failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One progress record for a single command of a provisioning run.
///
/// A command produces one `running` event when it starts and exactly one
/// terminal event (`success` or `failed`) when its outcome is known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
    /// Zero-based position of the command in the sequence.
    pub index: usize,
    /// Number of commands in the sequence.
    pub total: usize,
    /// Display label for the command (first line, secrets redacted).
    pub command: String,
    pub status: StepStatus,
    /// Tail of the interleaved stdout/stderr captured for the command.
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Remote exit status, when the command ran to completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
}

impl StepEvent {
    #[must_use]
    pub fn running(index: usize, total: usize, command: impl Into<String>) -> Self {
        Self {
            index,
            total,
            command: command.into(),
            status: StepStatus::Running,
            output: String::new(),
            error_message: None,
            exit_status: None,
        }
    }

    #[must_use]
    pub fn success(
        index: usize,
        total: usize,
        command: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            index,
            total,
            command: command.into(),
            status: StepStatus::Success,
            output: output.into(),
            error_message: None,
            exit_status: Some(0),
        }
    }

    #[must_use]
    pub fn failed(
        index: usize,
        total: usize,
        command: impl Into<String>,
        output: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            index,
            total,
            command: command.into(),
            status: StepStatus::Failed,
            output: output.into(),
            error_message: Some(error_message.into()),
            exit_status: None,
        }
    }

    /// Attach the remote exit status.
    #[must_use]
    pub fn with_exit_status(mut self, code: i32) -> Self {
        self.exit_status = Some(code);
        self
    }
}

/// Outcome of a one-shot connection test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionTestResult {
    pub ok: bool,
    pub message: String,
}

impl ConnectionTestResult {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Connection parameters as submitted by a front end.
///
/// Only the credential field selected by `auth_method` is meaningful; the
/// CLI crate validates this when converting into its descriptor type.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub user: String,
    pub auth_method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, alias = "key", skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("auth_method", &self.auth_method)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
