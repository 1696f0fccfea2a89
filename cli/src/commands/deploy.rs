//! `clawdeploy deploy`: provision a remote host and stream step progress.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::provision::{
    self, ProvisionOptions, ProvisionRequest, ProvisionStream, RunOutcome, RunSummary,
};
use crate::application::services::{config_service, plan};
use crate::commands::{ConnectionArgs, read_deploy_config};
use crate::domain::sequence::GATEWAY_PORT;
use crate::infra::assets::EmbeddedTemplates;
use crate::infra::ssh::Ssh2Connector;
use crate::output::{JsonReporter, TerminalReporter};

/// Conventional `128 + SIGINT`.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Deployment config file (YAML)
    #[arg(long, short, value_name = "FILE")]
    pub config: PathBuf,

    /// Per-command ceiling in seconds, 0 for none [default: execution.command_timeout_secs]
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,

    /// Whole-run ceiling in seconds, 0 for none [default: execution.run_timeout_secs]
    #[arg(long, value_name = "SECS")]
    pub run_timeout: Option<u64>,
}

/// Run the deploy command.
///
/// # Errors
///
/// Returns an error if the config or arguments are invalid. A failed run is
/// reported through the progress stream and exits with failure.
pub async fn run(app: &AppContext, args: DeployArgs) -> Result<ExitCode> {
    let settings = config_service::load_config(&app.config_store)?;
    let deploy_config = read_deploy_config(&args.config)?;
    let setup = plan::build_plan(&EmbeddedTemplates, &deploy_config)?;
    let descriptor = args
        .connection
        .descriptor(app, settings.connection.port)?;

    let mut options = ProvisionOptions::from(&settings);
    if let Some(secs) = args.command_timeout {
        options.command_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(secs) = args.run_timeout {
        options.run_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let target = descriptor.target();
    if !app.is_json() {
        println!();
        app.output.header(&format!(
            "Deploying agent to {target} ({} steps)",
            setup.commands.len()
        ));
        println!();
    }

    let cancel = CancellationToken::new();
    let stream = provision::spawn_provisioning(
        Ssh2Connector,
        ProvisionRequest {
            descriptor,
            commands: setup.commands,
            redactions: setup.secrets,
        },
        options,
        cancel.clone(),
    );
    let interrupt = tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });

    let ok = if app.is_json() {
        drive(stream, &JsonReporter).await.0
    } else {
        let reporter = TerminalReporter::new(&app.output);
        let (ok, summary, outcome) = drive(stream, &reporter).await;
        report_result(app, &reporter, &target, &summary, &outcome);
        ok
    };
    interrupt.abort();

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// First interrupt cancels at the next step boundary. Returns `true` on the
/// second one; `false` if the signal source fails.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut seen = 0u32;
    while next_interrupt().await.is_ok() {
        seen += 1;
        if seen > 1 {
            tracing::warn!("interrupted again; exiting without waiting for the current step");
            return true;
        }
        tracing::warn!("interrupted; stopping after the current step (Ctrl-C again to exit now)");
        cancel.cancel();
    }
    false
}

async fn drive(
    mut stream: ProvisionStream,
    reporter: &impl ProgressReporter,
) -> (bool, RunSummary, RunOutcome) {
    let summary = provision::consume(&mut stream, reporter).await;
    let outcome = stream.finish().await;
    tracing::debug!(?outcome, "provisioning finished");
    (summary.is_success() && outcome.is_success(), summary, outcome)
}

fn report_result(
    app: &AppContext,
    reporter: &TerminalReporter<'_>,
    target: &str,
    summary: &RunSummary,
    outcome: &RunOutcome,
) {
    match outcome {
        RunOutcome::Completed { steps } => {
            println!();
            app.output
                .success(&format!("Deployed to {target}: {steps} steps completed"));
            app.output.info(&format!(
                "Gateway listening on port {GATEWAY_PORT}; message your Telegram bot to start"
            ));
        }
        RunOutcome::Cancelled { completed } => {
            reporter.warn(&format!(
                "Deployment cancelled after {completed} of {} steps; the host may be partially provisioned",
                summary.total
            ));
        }
        RunOutcome::Aborted { index, .. } => {
            println!();
            app.output.error(&format!(
                "Deployment failed at step {} of {}; completed steps were not rolled back",
                index + 1,
                summary.total
            ));
        }
        RunOutcome::ConnectFailed(reason) => {
            app.output.error(&format!("Could not connect to {target}: {reason}"));
        }
        RunOutcome::Crashed(reason) => {
            app.output.error(&format!("Deployment stopped unexpectedly: {reason}"));
        }
    }
}
