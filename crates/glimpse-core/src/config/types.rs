//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the database and the thumbnail cache
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.glimpse"),
        }
    }
}

/// Directory scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Extensions to pick up (case-insensitive)
    pub supported_formats: Vec<String>,

    /// Follow symbolic links while walking
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            supported_formats: ["jpg", "jpeg", "png", "webp", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            follow_links: false,
        }
    }
}

/// Thumbnail cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Target width of cached thumbnails. Images no wider than this are
    /// used as they are.
    pub max_width: u32,

    /// JPEG quality (1-100)
    pub quality: u8,

    /// Extensions that are never downscaled (animated formats)
    pub unshrinkable_formats: Vec<String>,

    /// Images with either side above this are neither resized nor classified
    pub max_source_dimension: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: 600,
            quality: 80,
            unshrinkable_formats: vec!["gif".to_string()],
            max_source_dimension: 8000,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of parallel workers; 0 picks `available_parallelism - 2`
    pub parallel_workers: usize,
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max items handed to the worker pool at once
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    pub batch_pause_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            batch_pause_ms: 500,
        }
    }
}

/// Classifier settings. Without a remote classifier, images stay
/// unclassified and are retried on every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub remote: Option<RemoteClassifierConfig>,
}

/// HTTP classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteClassifierConfig {
    /// Endpoint receiving `POST {"image": <base64>, "media_type": ...}`
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Minimum delay between two requests of one worker
    pub min_interval_ms: u64,

    /// Per-request timeout
    pub timeout_ms: u64,

    /// Max retry attempts for transient failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for RemoteClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/classify".to_string(),
            api_key: "${GLIMPSE_CLASSIFIER_API_KEY}".to_string(),
            min_interval_ms: 1500,
            timeout_ms: 30000,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
