//! Human-readable terminal renderer.

use std::path::Path;

use clawdeploy_common::ConnectionTestResult;
use owo_colors::OwoColorize as _;

use crate::application::services::plan::PlannedCommand;
use crate::domain::config::ClawdeployConfig;
use crate::output::OutputContext;

/// Renders results as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.info(&format!("clawdeploy v{version}"));
    }

    /// Render the outcome of a connection test. Failures go to stderr.
    pub fn render_connection_test(&self, result: &ConnectionTestResult) {
        if result.ok {
            self.ctx.success(&result.message);
        } else {
            self.ctx.error(&result.message);
        }
    }

    /// Render a provisioning plan, one numbered line per command.
    pub fn render_plan(&self, commands: &[PlannedCommand]) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx
            .header(&format!("Provisioning plan ({} commands)", commands.len()));
        println!();
        let width = commands.len().to_string().len();
        for entry in commands {
            let counter = format!("{:>width$}.", entry.index + 1);
            let mut lines = entry.command.lines();
            let first = lines.next().unwrap_or_default();
            println!("  {} {first}", counter.style(self.ctx.styles.step));
            for line in lines {
                println!("  {:width$}  {}", "", line.style(self.ctx.styles.dim));
            }
        }
        println!();
    }

    /// Render the current settings.
    pub fn render_config(&self, config: &ClawdeployConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        let rows = [
            ("connection.port:", config.connection.port.to_string()),
            (
                "connection.timeout_secs:",
                config.connection.timeout_secs.to_string(),
            ),
            (
                "execution.command_timeout_secs:",
                limit_display(config.execution.command_timeout_secs),
            ),
            (
                "execution.run_timeout_secs:",
                limit_display(config.execution.run_timeout_secs),
            ),
            (
                "execution.output_tail_bytes:",
                config.execution.output_tail_bytes.to_string(),
            ),
        ];
        for (key, value) in rows {
            println!("  {key:<32} {value}");
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["CLAWDEPLOY_CONFIG", "CLAWDEPLOY_LOG", "NO_COLOR"] {
            println!(
                "    {:<20} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!();
    }
}

fn limit_display(secs: u64) -> String {
    if secs == 0 {
        "0 (no limit)".to_string()
    } else {
        secs.to_string()
    }
}
