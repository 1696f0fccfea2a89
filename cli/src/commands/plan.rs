//! `clawdeploy plan`: show the commands a deployment would run.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::plan;
use crate::commands::read_deploy_config;
use crate::infra::assets::EmbeddedTemplates;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Deployment config file (YAML)
    #[arg(long, short, value_name = "FILE")]
    pub config: PathBuf,

    /// Show the full text of each command, not just its first line
    #[arg(long)]
    pub full: bool,
}

/// Run the plan command. Secrets are masked in the output.
///
/// # Errors
///
/// Returns an error if the config is invalid or output fails.
pub fn run(app: &AppContext, args: &PlanArgs) -> Result<ExitCode> {
    let deploy_config = read_deploy_config(&args.config)?;
    let setup = plan::build_plan(&EmbeddedTemplates, &deploy_config)?;
    let commands = plan::describe_plan(&setup, args.full);
    app.renderer().render_plan(&commands)?;
    Ok(ExitCode::SUCCESS)
}
