//! Print the `<<<mrpe>>>` section
//! Usage: mrpe report [--parallel|--sequential] [--timeout N]

use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

use crate::config::MrpeConfig;

/// Overrides taken from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOverrides {
    pub parallel: Option<bool>,
    pub timeout: Option<u64>,
}

pub fn execute(config_path: Option<&Path>, overrides: ReportOverrides) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    apply_overrides(&mut config.mrpe, overrides);

    let provider = super::build_provider(&config.mrpe);
    if !provider.enabled() {
        tracing::info!("mrpe section is disabled");
        return Ok(());
    }

    let section = provider.generate_section();
    if section.is_empty() {
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    stdout.write_all(section.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn apply_overrides(config: &mut MrpeConfig, overrides: ReportOverrides) {
    if let Some(timeout) = overrides.timeout {
        config.timeout = timeout;
    }
    if let Some(parallel) = overrides.parallel {
        config.parallel = parallel;
    }
}
