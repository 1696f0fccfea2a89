//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod connection;
pub mod deploy;
pub mod error;
pub mod redact;
pub mod sequence;

pub use config::{ClawdeployConfig, validate_config_key, validate_config_value};
pub use connection::{ConnectionDescriptor, Credential, DEFAULT_SSH_PORT};
pub use deploy::DeployConfig;
pub use error::{ConfigError, ConnectionError, DeployConfigError, DescriptorError, ExecError};
pub use redact::Redactor;
pub use sequence::{CommandSequence, SetupPlan, Templates};
