//! clawdeploy - provision a remote VM as a self-hosted agent host

use std::process::ExitCode;

use clap::Parser;
use clawdeploy_cli::cli::Cli;
use clawdeploy_cli::logging::init_logging;
use clawdeploy_cli::output::json::format_error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    let json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            match format_error(&message, "COMMAND_FAILED") {
                Ok(obj) if json => println!("{obj}"),
                _ => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}
