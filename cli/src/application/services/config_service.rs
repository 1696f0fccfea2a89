//! Application service: configuration use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::ClawdeployConfig;

/// Load configuration.
pub fn load_config(store: &impl ConfigStore) -> Result<ClawdeployConfig> {
    store.load()
}

/// Validate and apply `key = value`, then persist.
///
/// # Errors
///
/// Returns an error if the key or value is invalid, or the store fails.
pub fn set_config_value(
    store: &impl ConfigStore,
    key: &str,
    value: &str,
) -> Result<ClawdeployConfig> {
    let mut config = store.load()?;
    config.set(key, value)?;
    store.save(&config)?;
    Ok(config)
}
