//! Configuration for taskdeck
//!
//! Stored in `<config dir>/taskdeck/config.toml`, or wherever
//! `TASKDECK_CONFIG` points.

use crate::storage::{DEFAULT_STORAGE_KEY, FileStorage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "taskdeck";
const CONFIG_FILE: &str = "config.toml";

/// Overrides the config file location
pub const CONFIG_ENV: &str = "TASKDECK_CONFIG";
/// Overrides the data directory
pub const DATA_DIR_ENV: &str = "TASKDECK_DATA_DIR";

/// taskdeck configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the snapshot file (defaults to the platform data dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Name of the snapshot slot; the file is `<storage_key>.json`
    pub storage_key: String,

    /// Display settings
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            display: DisplayConfig::default(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Use colors in output
    pub colors: bool,

    /// Date format for display
    pub date_format: String,

    /// Maximum name length in tables before truncation
    pub max_name_length: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            date_format: "%Y-%m-%d".to_string(),
            max_name_length: 48,
        }
    }
}

impl Config {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("failed to serialize: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Where the config file lives
    pub fn default_path() -> crate::Result<PathBuf> {
        if let Some(path) = env_path(CONFIG_ENV) {
            return Ok(path);
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or_else(|| crate::Error::Config("could not determine config directory".into()))
    }

    /// Data directory: `TASKDECK_DATA_DIR`, then `data_dir`, then the
    /// platform data dir
    pub fn resolve_data_dir(&self) -> crate::Result<PathBuf> {
        if let Some(dir) = env_path(DATA_DIR_ENV) {
            return Ok(dir);
        }
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| crate::Error::Config("could not determine data directory".into()))
    }

    /// File storage for the configured slot
    pub fn storage(&self) -> crate::Result<FileStorage> {
        Ok(FileStorage::new(self.resolve_data_dir()?, self.storage_key.clone()))
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        format!(
            r#"# taskdeck configuration

# Directory holding the snapshot (defaults to the platform data directory)
# data_dir = "/home/me/.local/share/taskdeck"

# Snapshot slot name; data is stored in <data_dir>/<storage_key>.json
storage_key = "{DEFAULT_STORAGE_KEY}"

[display]
# Use colors in output
colors = true

# Date format for display (strftime format)
date_format = "%Y-%m-%d"

# Maximum name length in tables before truncation
max_name_length = 48
"#
        )
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
