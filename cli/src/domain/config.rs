//! Domain types and validators for clawdeploy settings.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::connection::DEFAULT_SSH_PORT;
use crate::domain::error::ConfigError;
use crate::domain::redact::DEFAULT_OUTPUT_TAIL_BYTES;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "connection.port",
    "connection.timeout_secs",
    "execution.command_timeout_secs",
    "execution.run_timeout_secs",
    "execution.output_tail_bytes",
];

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.clawdeploy/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ClawdeployConfig {
    pub connection: ConnectionSettings,
    pub execution: ExecutionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Port used when `--port` is not given.
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SSH_PORT,
            timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Per-command ceiling; `0` disables it.
    pub command_timeout_secs: u64,
    /// Whole-run ceiling; `0` disables it.
    pub run_timeout_secs: u64,
    pub output_tail_bytes: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            command_timeout_secs: 0,
            run_timeout_secs: 0,
            output_tail_bytes: DEFAULT_OUTPUT_TAIL_BYTES,
        }
    }
}

impl ClawdeployConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.timeout_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.execution.command_timeout_secs)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.execution.run_timeout_secs)
    }

    /// Apply a validated `key = value` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid for it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        // Parsing cannot fail after validation; fall back to the current value.
        match key {
            "connection.port" => {
                self.connection.port = value.parse().unwrap_or(self.connection.port);
            }
            "connection.timeout_secs" => {
                self.connection.timeout_secs = value.parse().unwrap_or(self.connection.timeout_secs);
            }
            "execution.command_timeout_secs" => {
                self.execution.command_timeout_secs =
                    value.parse().unwrap_or(self.execution.command_timeout_secs);
            }
            "execution.run_timeout_secs" => {
                self.execution.run_timeout_secs =
                    value.parse().unwrap_or(self.execution.run_timeout_secs);
            }
            "execution.output_tail_bytes" => {
                self.execution.output_tail_bytes =
                    value.parse().unwrap_or(self.execution.output_tail_bytes);
            }
            _ => {}
        }
        Ok(())
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let (ok, valid) = match key {
        "connection.port" => (
            value.parse::<u16>().is_ok_and(|p| p > 0),
            "an integer between 1 and 65535",
        ),
        "connection.timeout_secs" | "execution.output_tail_bytes" => (
            value.parse::<u64>().is_ok_and(|n| n > 0),
            "a positive integer",
        ),
        "execution.command_timeout_secs" | "execution.run_timeout_secs" => (
            value.parse::<u64>().is_ok(),
            "a non-negative integer (0 disables the limit)",
        ),
        _ => (true, ""),
    };
    if !ok {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            valid: valid.to_string(),
        }
        .into());
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
