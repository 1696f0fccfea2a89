//! Deployment configuration: the typed input of the sequence builder.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use clawdeploy_common::{AutonomyLevel, Network};
use serde::{Deserialize, Serialize};

use crate::domain::error::DeployConfigError;

pub const DEFAULT_MODEL: &str = "openrouter/anthropic/claude-sonnet-4";

/// Options recognised for one agent deployment.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(default)]
    pub autonomy_level: AutonomyLevel,
    #[serde(default)]
    pub network: Network,
    #[serde(default = "default_model")]
    pub model: String,
    pub telegram_token: String,
    pub openrouter_key: String,
    pub wallet_password: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl std::fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployConfig")
            .field("autonomy_level", &self.autonomy_level)
            .field("network", &self.network)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl DeployConfig {
    /// Reject empty credentials and malformed model identifiers.
    ///
    /// # Errors
    ///
    /// Returns the first [`DeployConfigError`] found.
    pub fn validate(&self) -> Result<(), DeployConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(DeployConfigError::Missing("telegram_token"));
        }
        if self.openrouter_key.trim().is_empty() {
            return Err(DeployConfigError::Missing("openrouter_key"));
        }
        if self.wallet_password.is_empty() {
            return Err(DeployConfigError::Missing("wallet_password"));
        }
        let model = self.model.trim();
        if model.is_empty() || model.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
            return Err(DeployConfigError::InvalidModel(self.model.clone()));
        }
        Ok(())
    }

    /// Values that must never appear in logs or progress output.
    #[must_use]
    pub fn secrets(&self) -> Vec<String> {
        vec![
            self.openrouter_key.clone(),
            self.telegram_token.clone(),
            self.wallet_password.clone(),
        ]
    }
}

/// Spending limits written into the agent's `state.json`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutonomyLimits {
    pub daily: f64,
    pub per_transaction: f64,
    pub trust: &'static str,
}

impl AutonomyLimits {
    #[must_use]
    pub fn for_level(level: AutonomyLevel) -> Self {
        match level {
            AutonomyLevel::Conservative => Self {
                daily: 1.0,
                per_transaction: 0.5,
                trust: "restricted",
            },
            AutonomyLevel::Balanced => Self {
                daily: 10.0,
                per_transaction: 5.0,
                trust: "standard",
            },
            AutonomyLevel::Autonomous => Self {
                daily: 50.0,
                per_transaction: 25.0,
                trust: "elevated",
            },
        }
    }
}
