//! Configuration management for Glimpse.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the SQLite database inside the data directory.
const DATABASE_FILENAME: &str = "glimpse.db";

/// Name of the thumbnail cache directory inside the data directory.
const CACHE_DIRNAME: &str = "resized";

/// Root configuration structure for Glimpse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Directory scanning
    pub scan: ScanConfig,

    /// Thumbnail cache
    pub thumbnail: ThumbnailConfig,

    /// Worker pool
    pub workers: WorkerConfig,

    /// Batching and pacing
    pub pipeline: PipelineConfig,

    /// Classifier backend
    pub classifier: ClassifierConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.glimpse.glimpse/config.toml
    /// - Linux: ~/.config/glimpse/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\glimpse\config\config.toml
    ///
    /// Falls back to ~/.glimpse/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "glimpse", "glimpse")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".glimpse").join("config.toml")
            })
    }

    /// Resolved data directory (with ~ expansion).
    pub fn data_dir(&self) -> PathBuf {
        let path_str = self.general.data_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(DATABASE_FILENAME)
    }

    /// Root of the thumbnail cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join(CACHE_DIRNAME)
    }

    /// Effective worker count: configured, or `available_parallelism - 2`
    /// with a floor of one.
    pub fn effective_workers(&self) -> usize {
        if self.workers.parallel_workers > 0 {
            return self.workers.parallel_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(2))
            .unwrap_or(1)
            .max(1)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
