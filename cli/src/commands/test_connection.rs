//! `clawdeploy test-connection`: open and close an SSH session.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::{config_service, connection_test};
use crate::commands::ConnectionArgs;
use crate::infra::ssh::Ssh2Connector;
use crate::output::progress;

#[derive(Args, Debug)]
pub struct TestConnectionArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Seconds to wait for the session [default: connection.timeout_secs]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

/// Run the test-connection command.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or settings cannot be read.
/// An unreachable host is not an error; it exits with failure.
pub async fn run(app: &AppContext, args: TestConnectionArgs) -> Result<ExitCode> {
    let settings = config_service::load_config(&app.config_store)?;
    let descriptor = args
        .connection
        .descriptor(app, settings.connection.port)?;
    let timeout = args
        .timeout
        .map_or_else(|| settings.connect_timeout(), Duration::from_secs);

    let pb = (app.output.show_progress() && !app.is_json())
        .then(|| progress::spinner(&format!("Connecting to {}", descriptor.target())));
    let result = connection_test::test_connection(&Ssh2Connector, &descriptor, timeout).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    app.renderer().render_connection_test(&result)?;
    Ok(if result.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
