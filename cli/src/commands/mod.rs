//! Command implementations

pub mod config;
pub mod deploy;
pub mod plan;
pub mod test_connection;
pub mod version;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::domain::connection::{ConnectionDescriptor, Credential};
use crate::domain::deploy::DeployConfig;

/// Where and how to reach the remote host.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Remote host name or IP address
    #[arg(long)]
    pub host: String,

    /// SSH port [default: connection.port setting, else 22]
    #[arg(long)]
    pub port: Option<u16>,

    /// Remote user
    #[arg(long, short)]
    pub user: String,

    /// Password for password authentication (prompted when omitted)
    #[arg(long, env = "CLAWDEPLOY_SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Unencrypted private key file; takes precedence over a password
    #[arg(long, value_name = "PATH")]
    pub key_file: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Build a validated descriptor, prompting for a password if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be read, no password is
    /// available, or any field is invalid.
    pub fn descriptor(&self, app: &AppContext, default_port: u16) -> Result<ConnectionDescriptor> {
        let credential = match (&self.key_file, &self.password) {
            (Some(path), _) => Credential::PrivateKey(
                std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read key file {}", path.display()))?,
            ),
            (None, Some(password)) => Credential::Password(password.clone()),
            (None, None) => {
                let prompt = format!("Password for {}@{}", self.user, self.host);
                Credential::Password(app.prompt_secret(&prompt)?)
            }
        };
        let descriptor = ConnectionDescriptor::new(
            self.host.as_str(),
            self.port.unwrap_or(default_port),
            self.user.as_str(),
            credential,
        )?;
        Ok(descriptor)
    }
}

/// Read and validate a deployment config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn read_deploy_config(path: &Path) -> Result<DeployConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let config: DeployConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid deployment config {}", path.display()))?;
    Ok(config)
}
