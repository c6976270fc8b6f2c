//! Glimpse Core - incremental image scanning library.
//!
//! Glimpse walks a directory tree, caches downscaled thumbnails, labels each
//! image with a pluggable classifier and keeps the results in a store, so a
//! rescan of the same directory only does the work that is still missing.
//!
//! # Architecture
//!
//! ```text
//! Scan → Reconcile (against Store) → Thumbnail + Classify (worker pool) → Persist
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use glimpse_core::{classify, Config, Glimpse};
//!
//! #[tokio::main]
//! async fn main() -> glimpse_core::Result<()> {
//!     let config = Config::load()?;
//!     let classifiers = classify::factory_from_config(&config.classifier)?;
//!     let glimpse = Glimpse::open(config, Arc::from(classifiers))?;
//!
//!     let report = glimpse.scan("./photos".as_ref(), None).await?;
//!     println!("{} images, {} unclassified", report.records.len(), report.unclassified);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod types;

pub use classify::{Classifier, ClassifierFactory};
pub use config::Config;
pub use error::{
    ClassifyError, ConfigError, GlimpseError, PipelineError, Result, ScanError, StoreError,
    ThumbnailError, WorkError,
};
pub use output::{OutputFormat, RecordWriter};
pub use pipeline::{Pipeline, ProgressCallback};
pub use store::{SqliteStore, Store};
pub use types::{
    Classification, Dimensions, ImageRecord, Label, PipelineReport, PipelineState, Progress,
    ScanSession, SessionId,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What `delete_paths` removed.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct DeleteSummary {
    /// Source files removed from disk
    pub files_removed: usize,
    /// Cached thumbnails removed
    pub thumbnails_removed: usize,
    /// Store rows removed, across all sessions
    pub records_removed: usize,
    /// Paths whose source file could not be removed; their records are kept
    pub failed: Vec<(PathBuf, String)>,
}

/// Glimpse engine - configuration, store and pipeline wired together.
pub struct Glimpse {
    config: Config,
    store: Arc<dyn Store>,
    pipeline: Pipeline,
}

impl Glimpse {
    /// Open the SQLite store under the configured data directory.
    pub fn open(config: Config, classifiers: Arc<dyn ClassifierFactory>) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path())?;
        Ok(Self::with_store(config, Arc::new(store), classifiers))
    }

    /// Build the engine on an existing store.
    pub fn with_store(
        config: Config,
        store: Arc<dyn Store>,
        classifiers: Arc<dyn ClassifierFactory>,
    ) -> Self {
        tracing::debug!(
            "Initializing Glimpse v{} (classifier: {})",
            VERSION,
            classifiers.name()
        );
        let pipeline = Pipeline::new(&config, Arc::clone(&store), classifiers);
        Self {
            config,
            store,
            pipeline,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline over `root`.
    pub async fn scan(
        &self,
        root: &Path,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<PipelineReport> {
        Ok(self.pipeline.run(root, on_progress).await?)
    }

    /// Mark or unmark `path` as a favorite in every session holding it.
    /// Returns the number of records updated. Blocking.
    pub fn set_favorite(&self, path: &Path, favorite: bool) -> Result<usize> {
        Ok(self.store.set_favorite(path, favorite)?)
    }

    /// All tracked directories. Blocking.
    pub fn sessions(&self) -> Result<Vec<ScanSession>> {
        Ok(self.store.sessions()?)
    }

    /// Forget a tracked directory and its records. Blocking.
    pub fn forget_session(&self, session: SessionId) -> Result<bool> {
        Ok(self.store.delete_session(session)?)
    }

    /// Delete source files, their cached thumbnails and their records.
    ///
    /// Destructive. Files that are already gone count as deleted. Thumbnails
    /// are removed at the current width and wherever the store recorded one,
    /// so entries written under an earlier `max_width` go too. A file that
    /// cannot be removed keeps its thumbnails and record and is reported in
    /// [`DeleteSummary::failed`]. Blocking.
    pub fn delete_paths(&self, paths: &[PathBuf]) -> Result<DeleteSummary> {
        let mut summary = DeleteSummary::default();
        let mut gone = Vec::with_capacity(paths.len());

        for path in paths {
            match std::fs::remove_file(path) {
                Ok(()) => summary.files_removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Cannot delete {:?}: {e}", path);
                    summary.failed.push((path.clone(), e.to_string()));
                    continue;
                }
            }
            match self.pipeline.thumbnails().remove(path) {
                Ok(true) => summary.thumbnails_removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Cannot delete thumbnail of {:?}: {e}", path),
            }
            gone.push(path.clone());
        }

        for thumbnail in self.store.thumbnail_paths(&gone)? {
            match pipeline::thumbnail::remove_if_present(&thumbnail) {
                Ok(true) => summary.thumbnails_removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Cannot delete thumbnail {:?}: {e}", thumbnail),
            }
        }

        summary.records_removed = self.store.delete_records(&gone)?;
        tracing::info!(
            "Deleted {} file(s), {} thumbnail(s), {} record(s)",
            summary.files_removed,
            summary.thumbnails_removed,
            summary.records_removed
        );
        Ok(summary)
    }
}
