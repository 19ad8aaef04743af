//! Runtime settings and rule file discovery
//!
//! The rules file is located using the following priority:
//! 1. An explicit path (e.g. from the command line)
//! 2. The `SIFT_RULES_FILE` environment variable
//! 3. ~/.config/sift/rules.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rules filename in the Sift config directory
pub const RULES_FILE: &str = "rules.json";

/// Optional settings filename in the Sift config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Processed-message state filename in the Sift config directory
pub const STATE_FILE: &str = "processed.json";

/// Environment variable overriding the rules file location
pub const RULES_FILE_ENV: &str = "SIFT_RULES_FILE";

/// Messages evaluated per engine batch unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Tunables for a processing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Messages evaluated per engine batch
    pub batch_size: usize,
    /// Only process messages received within this many days
    pub lookback_days: Option<u32>,
    /// Upper bound on messages fetched per run
    pub max_messages: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lookback_days: None,
            max_messages: None,
        }
    }
}

impl Settings {
    /// Load ~/.config/sift/settings.json, or defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        let path = config::config_path(SETTINGS_FILE)
            .context("Could not determine config directory")?;
        match config::load_json_if_exists::<Settings>(&path)? {
            Some(settings) => settings.validated(),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Settings = config::load_json_file(path)?;
        settings.validated()
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(json).context("Failed to parse settings JSON")?;
        settings.validated()
    }

    fn validated(self) -> Result<Self> {
        anyhow::ensure!(self.batch_size > 0, "batch_size must be at least 1");
        Ok(self)
    }
}

/// Resolve the rules file path
pub fn locate_rules_file(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_rules_path(explicit, std::env::var(RULES_FILE_ENV).ok())
}

fn resolve_rules_path(explicit: Option<&Path>, from_env: Option<String>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = from_env.filter(|p| !p.trim().is_empty()) {
        return Ok(PathBuf::from(path));
    }

    config::config_path(RULES_FILE).context("Could not determine config directory")
}

/// Default location of the processed-message state file
pub fn default_state_path() -> Option<PathBuf> {
    config::config_path(STATE_FILE)
}
