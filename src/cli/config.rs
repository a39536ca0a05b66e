//! CLI Configuration.
//!
//! Where the CLI keeps its state and how it talks to the operator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::output::OutputFormat;
use super::{CliError, CliResult};
use crate::utils::constants::{MAX_PRICE_DEVIATION_BPS, MAX_PRICE_STALENESS_SECS};

/// Environment variable overriding the data directory
pub const ENV_DATA_DIR: &str = "MYUSD_DATA_DIR";
/// Environment variable overriding the output format
pub const ENV_OUTPUT: &str = "MYUSD_OUTPUT";
/// Environment variable overriding the oracle staleness bound
pub const ENV_MAX_PRICE_AGE: &str = "MYUSD_MAX_PRICE_AGE";

// ═══════════════════════════════════════════════════════════════════════════════
// CLI CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory holding the persisted engine
    pub data_dir: PathBuf,
    /// Output format
    pub output: OutputFormat,
    /// Colored text output
    pub color: bool,
    /// Seconds before an oracle price is considered stale
    pub max_price_age_secs: u64,
    /// Largest accepted move between consecutive prices, in bps
    pub max_price_deviation_bps: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output: OutputFormat::Text,
            color: true,
            max_price_age_secs: MAX_PRICE_STALENESS_SECS,
            max_price_deviation_bps: MAX_PRICE_DEVIATION_BPS,
        }
    }
}

impl CliConfig {
    /// Configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CliError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CliError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| CliError::Io(e.to_string()))
    }

    /// Apply environment overrides
    pub fn apply_env(self) -> CliResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(format) = lookup(ENV_OUTPUT) {
            self.output = format
                .parse()
                .map_err(|e: String| CliError::Config(format!("{}: {}", ENV_OUTPUT, e)))?;
        }

        if let Some(age) = lookup(ENV_MAX_PRICE_AGE) {
            self.max_price_age_secs = age.parse().map_err(|_| {
                CliError::Config(format!("{} must be a whole number of seconds", ENV_MAX_PRICE_AGE))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Default config file path inside the data directory
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("cli.json")
    }

    /// Validate configuration
    pub fn validate(&self) -> CliResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CliError::Config("data directory cannot be empty".into()));
        }

        if self.max_price_age_secs == 0 {
            return Err(CliError::Config("price age bound must be greater than 0".into()));
        }

        if self.max_price_deviation_bps == 0 {
            return Err(CliError::Config("price deviation bound must be greater than 0".into()));
        }

        Ok(())
    }
}

/// Get default data directory
fn default_data_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join(".myusd"),
        _ => PathBuf::from(".myusd"),
    }
}
