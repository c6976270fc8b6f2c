//! Error types for the Glimpse pipeline.
//!
//! Errors are split by how far they are allowed to travel: per-item errors
//! (`ThumbnailError`, `ClassifyError`, wrapped in `WorkError`) never leave the
//! worker pool, while `ScanError` and `StoreError` end a pipeline invocation.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ImageRecord;

/// Top-level error type for Glimpse operations.
#[derive(Error, Debug)]
pub enum GlimpseError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline invocation errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Classifier setup errors
    #[error("Classifier error: {0}")]
    Classify(#[from] ClassifyError),

    /// Store errors outside of a pipeline run (favorites, deletes)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// The root directory could not be enumerated.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root has no lossless string form to key its session by
    #[error("Directory path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Cannot read directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resizing or caching failed for one file.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("Cannot write thumbnail {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The classifier could not label one image.
#[derive(Error, Debug, Clone)]
pub enum ClassifyError {
    /// The bytes handed to the classifier are not a readable image
    #[error("Cannot decode image: {0}")]
    Decode(String),

    /// The model itself failed
    #[error("Model error: {0}")]
    Model(String),

    /// A network-backed classifier failed
    #[error("Remote classifier error: {message}")]
    Remote {
        message: String,
        status_code: Option<u16>,
    },

    /// The request did not finish in time
    #[error("Classifier timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// No classifier is configured or it failed to load
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

/// What a worker records in `WorkResult::error`.
#[derive(Error, Debug)]
pub enum WorkError {
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The item panicked inside its worker
    #[error("Worker panicked: {0}")]
    Panicked(String),

    /// The worker thread itself was lost before reporting this item
    #[error("Worker lost: {0}")]
    WorkerLost(String),
}

/// Persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot encode classification: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store task failed: {0}")]
    Task(String),
}

/// Errors that end a pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Nothing ran: the directory could not be scanned
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    /// Prior state could not be loaded; nothing was processed
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    /// Processing finished but the results could not be saved.
    /// The in-memory records are still handed back.
    #[error("Failed to persist {} records: {source}", records.len())]
    Persist {
        records: Vec<ImageRecord>,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    /// Records produced before the failure, if any.
    pub fn records(&self) -> Option<&[ImageRecord]> {
        match self {
            PipelineError::Persist { records, .. } => Some(records),
            _ => None,
        }
    }
}

/// Convenience type alias for Glimpse results.
pub type Result<T> = std::result::Result<T, GlimpseError>;

/// Convenience type alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
