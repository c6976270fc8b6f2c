//! Core data types for the Glimpse pipeline.
//!
//! `ImageRecord` is the durable unit; `WorkItem`/`WorkResult` only exist while
//! a batch is in flight and are always folded back into records.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::WorkError;

/// Width and height in pixels. `0x0` means "could not be determined".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when the size probe failed.
    pub fn is_unknown(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scale to a fixed width, keeping the aspect ratio.
    ///
    /// An unknown width yields a height of 0 rather than dividing by zero.
    pub fn scaled_to_width(&self, width: u32) -> Self {
        if self.width == 0 {
            return Self { width, height: 0 };
        }
        let height = (self.height as f64 / self.width as f64 * width as f64).round() as u32;
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned box in source pixel coordinates: `[x, y, width, height]`.
pub type BoundingBox = [f32; 4];

/// One detection or label reported by a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Label name (e.g., "person", "face")
    pub name: String,

    /// Confidence score from 0.0 to 1.0
    pub score: f32,

    /// Region the label applies to, for detectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Label {
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
            bbox: None,
        }
    }

    pub fn with_bbox(name: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            name: name.into(),
            score,
            bbox: Some(bbox),
        }
    }
}

/// Structured classifier output. The pipeline only cares whether it exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub labels: Vec<Label>,

    /// Model identifier, if the classifier reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Classification {
    pub fn new(labels: Vec<Label>) -> Self {
        Self {
            labels,
            model: None,
        }
    }

    /// Highest scoring label, if any.
    pub fn top_label(&self) -> Option<&Label> {
        self.labels
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// One tracked image within a scan session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Absolute path to the source file, unique within a session
    pub path: PathBuf,

    /// Size of the original image (or of the thumbnail when one exists)
    pub dimensions: Dimensions,

    /// Cached resized copy; `None` means "use the original"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,

    /// User-set flag, never changed by a rescan
    #[serde(default)]
    pub favorite: bool,
}

impl ImageRecord {
    /// A record for a path that has not been processed yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dimensions: Dimensions::default(),
            thumbnail_path: None,
            classification: None,
            favorite: false,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.classification.is_some()
    }

    /// The file a viewer should load.
    ///
    /// Falls back to the original when the cached thumbnail has disappeared
    /// from disk, so a pruned cache never breaks a read.
    pub fn display_path(&self) -> &Path {
        match &self.thumbnail_path {
            Some(thumb) if thumb.exists() => thumb,
            _ => &self.path,
        }
    }

    /// Fold a finished work result into this record.
    ///
    /// Geometry is taken from the result; a classification is only ever
    /// added, never cleared, and `favorite` is left alone.
    pub fn apply(&mut self, result: WorkResult) {
        self.dimensions = result.dimensions;
        self.thumbnail_path = result.thumbnail_path;
        if result.classification.is_some() {
            self.classification = result.classification;
        }
    }
}

/// Store identity of a tracked root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: SessionId,
    /// Normalized directory path (canonical, `/` separators)
    pub directory: String,
}

/// A path found by the scanner, annotated with any thumbnail already in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedImage {
    pub path: PathBuf,
    pub cached_thumbnail: Option<PathBuf>,
}

impl ScannedImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached_thumbnail: None,
        }
    }
}

/// Unit of work submitted to the worker pool.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub path: PathBuf,

    /// Partially processed record from an earlier run. Its dimensions and
    /// thumbnail are reused so only classification is redone.
    pub prior: Option<ImageRecord>,
}

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prior: None,
        }
    }

    pub fn resume(record: ImageRecord) -> Self {
        Self {
            path: record.path.clone(),
            prior: Some(record),
        }
    }

    /// The record this item folds into once processed.
    pub fn base_record(&self) -> ImageRecord {
        self.prior
            .clone()
            .unwrap_or_else(|| ImageRecord::new(self.path.clone()))
    }
}

/// Outcome of one work item. Failures are data, not control flow.
#[derive(Debug)]
pub struct WorkResult {
    pub path: PathBuf,
    pub dimensions: Dimensions,
    pub thumbnail_path: Option<PathBuf>,
    pub classification: Option<Classification>,
    pub error: Option<WorkError>,
}

impl WorkResult {
    /// A result for an item that produced nothing.
    pub fn failed(item: &WorkItem, error: WorkError) -> Self {
        let (dimensions, thumbnail_path) = match &item.prior {
            Some(prior) => (prior.dimensions, prior.thumbnail_path.clone()),
            None => (Dimensions::default(), None),
        };
        Self {
            path: item.path.clone(),
            dimensions,
            thumbnail_path,
            classification: None,
            error: Some(error),
        }
    }
}

/// Progress of the processing stage, reported after every batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Items processed so far
    pub processed: usize,
    /// Items that needed processing in this run
    pub total: usize,
    /// Batches completed
    pub batch: usize,
    /// Total batches
    pub batches: usize,
}

impl Progress {
    /// Completion as a fraction in `0.0..=1.0`; an empty run is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// Pipeline state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Scanning,
    Reconciling,
    Processing,
    Persisting,
    Failed,
}

/// What a completed pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub session: SessionId,

    /// Reusable and freshly processed records, in scan order
    pub records: Vec<ImageRecord>,

    /// Records taken from the store without recomputation
    pub reused: usize,

    /// Records that went through the worker pool
    pub processed: usize,

    /// Records still lacking a classification; retried on the next run
    pub unclassified: usize,

    /// Items whose work result carried an error
    pub failed_paths: Vec<PathBuf>,

    /// Stored paths no longer present under the root (kept in the store)
    pub missing: Vec<PathBuf>,
}
