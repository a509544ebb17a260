//! MRPE settings loaded from the agent's TOML configuration
//!
//! ```toml
//! [mrpe]
//! enabled = true
//! timeout = 60
//! parallel = false
//! base_dir = "/etc/check_mk"
//! config = [
//!     "check = Load /usr/lib/nagios/plugins/check_load -w 5,4,3 -c 10,8,6",
//!     "include nagios = $CUSTOM_AGENT_PATH$/mrpe.cfg",
//! ]
//! ```
//!
//! Unknown keys are ignored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::markers::Markers;

/// Default per-entry timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Smallest accepted per-entry timeout in seconds
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Top level of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub mrpe: MrpeConfig,
}

impl AgentConfig {
    /// Load and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid MRPE configuration")
    }
}

/// The `[mrpe]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrpeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-entry timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub parallel: bool,

    /// Upper bound for parallel workers; defaults to the available parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Trace-log raw process output
    #[serde(default)]
    pub log_output: bool,

    /// Base for relative paths and `$CUSTOM_AGENT_PATH$`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Target of `$BUILTIN_AGENT_PATH$`; defaults to `base_dir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin_dir: Option<PathBuf>,

    /// Ordered `check = ...` and `include [user] = ...` directives
    #[serde(default)]
    pub config: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for MrpeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: DEFAULT_TIMEOUT_SECS,
            parallel: false,
            max_workers: None,
            log_output: false,
            base_dir: None,
            builtin_dir: None,
            config: Vec::new(),
        }
    }
}

impl MrpeConfig {
    /// Per-entry timeout, never below [`MIN_TIMEOUT_SECS`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(MIN_TIMEOUT_SECS))
    }

    /// Worker pool size for parallel runs, at least 1.
    pub fn worker_limit(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1)
    }

    pub fn markers(&self) -> Markers {
        let base = self.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let builtin = self.builtin_dir.clone().unwrap_or_else(|| base.clone());
        Markers::new(base).with_builtin_dir(builtin)
    }
}
