//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;

// ── Connection descriptor errors ──────────────────────────────────────────────

/// Rejections raised while constructing a `ConnectionDescriptor`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("invalid host '{0}': expected a hostname or IP address")]
    InvalidHost(String),

    #[error("port must be between 1 and 65535")]
    InvalidPort,

    #[error("user must not be empty")]
    EmptyUser,

    #[error("invalid user '{0}': must not contain whitespace")]
    InvalidUser(String),

    #[error("password authentication selected but no password was provided")]
    MissingPassword,

    #[error("key authentication selected but no private key was provided")]
    MissingPrivateKey,

    #[error("private key is not a PEM-encoded private key")]
    UnparseableKey,

    #[error("private key is passphrase-protected; only unencrypted keys are supported")]
    EncryptedKey,
}

// ── Remote session errors ─────────────────────────────────────────────────────

/// Failures while opening a remote shell session. Fatal to a provisioning run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("cannot resolve host '{host}': {reason}")]
    Resolve { host: String, reason: String },

    #[error("connection to {addr} refused")]
    Refused { addr: String },

    #[error("connection to {addr} timed out after {}s", .timeout.as_secs())]
    TimedOut { addr: String, timeout: Duration },

    #[error("cannot reach {addr}: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("SSH handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    #[error("authentication rejected for user '{user}': {reason}")]
    AuthRejected { user: String, reason: String },

    #[error("invalid connection parameters: {0}")]
    InvalidDescriptor(String),
}

/// Failures while running a single command on an open session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The session itself dropped (network partition, remote reset).
    #[error("connection lost: {0}")]
    Transport(String),

    /// The command exceeded its time ceiling.
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

// ── Deploy config errors ──────────────────────────────────────────────────────

/// Errors in the user-supplied deployment configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeployConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid model identifier '{0}'")]
    InvalidModel(String),

    #[error("template '{name}' is not valid JSON: {reason}")]
    InvalidTemplate { name: String, reason: String },
}

// ── Settings errors ───────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
