//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `CLAWDEPLOY_LOG` environment variable (`EnvFilter` syntax, e.g.
//!    `clawdeploy_cli=debug`)
//! 3. default to `warn`
//!
//! Logs go to stderr so `--json` output on stdout stays machine-readable.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CLAWDEPLOY_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Build the filter for the given CLI level, falling back to the environment.
#[must_use]
pub fn filter(cli_level: Option<LogLevel>) -> EnvFilter {
    match cli_level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(cli_level: Option<LogLevel>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(cli_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
