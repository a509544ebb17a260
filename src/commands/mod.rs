pub mod entries;
pub mod parse;
pub mod report;

use anyhow::Result;
use std::path::Path;

use crate::config::{AgentConfig, MrpeConfig};
use crate::provider::MrpeProvider;

/// Load the configuration file, or the defaults when none is given.
pub fn load_config(config_path: Option<&Path>) -> Result<AgentConfig> {
    match config_path {
        Some(path) => AgentConfig::load(path),
        None => Ok(AgentConfig::default()),
    }
}

/// Load the configuration and build a provider from it.
pub fn load_provider(config_path: Option<&Path>) -> Result<(AgentConfig, MrpeProvider)> {
    let config = load_config(config_path)?;
    let provider = build_provider(&config.mrpe);
    Ok((config, provider))
}

pub fn build_provider(config: &MrpeConfig) -> MrpeProvider {
    let mut provider = MrpeProvider::new();
    provider.load_config(config);
    provider
}
