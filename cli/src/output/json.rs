//! JSON output helpers.
//!
//! Provides the error-object formatter used by all `--json` code paths when
//! a command fails, and the machine-readable renderer.

use std::path::Path;

use anyhow::{Context, Result};
use clawdeploy_common::ConnectionTestResult;
use serde_json::json;

use crate::application::services::plan::PlannedCommand;
use crate::domain::config::ClawdeployConfig;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Renders results as pretty-printed JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        print_pretty(&json!({ "version": version }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_connection_test(&self, result: &ConnectionTestResult) -> Result<()> {
        print_pretty(result)
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_plan(&self, commands: &[PlannedCommand]) -> Result<()> {
        print_pretty(&json!({
            "total": commands.len(),
            "commands": commands,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &ClawdeployConfig, path: &Path) -> Result<()> {
        print_pretty(&json!({
            "path": path.display().to_string(),
            "config": config,
        }))
    }
}

fn print_pretty(value: &impl serde::Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}
