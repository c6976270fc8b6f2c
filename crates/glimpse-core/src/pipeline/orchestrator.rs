//! Scan, reconcile, process and persist one root directory.
//!
//! ```text
//! Idle → Scanning → Reconciling → Processing → Persisting → Idle
//!           └──────────────┴── scan or store failure ──→ Failed
//! ```
//!
//! Per-item failures never end a run; they stay in the returned records as
//! unclassified entries and are retried on the next run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use super::job::ImageJob;
use super::pool::WorkerPool;
use super::reconcile::{Reconciler, Reconciliation};
use super::scanner::Scanner;
use super::thumbnail::ThumbnailCache;
use crate::classify::ClassifierFactory;
use crate::config::{Config, PipelineConfig};
use crate::error::{PipelineError, ScanError, StoreError, StoreResult};
use crate::fingerprint::normalize_path;
use crate::store::Store;
use crate::types::{
    ImageRecord, PipelineReport, PipelineState, Progress, ScannedImage, SessionId, WorkItem,
    WorkResult,
};

/// Callback invoked after every processed batch.
pub type ProgressCallback<'a> = &'a (dyn Fn(Progress) + Send + Sync);

/// The incremental scan pipeline.
pub struct Pipeline {
    store: Arc<dyn Store>,
    classifiers: Arc<dyn ClassifierFactory>,
    thumbnails: Arc<ThumbnailCache>,
    scanner: Scanner,
    reconciler: Reconciler,
    pool: WorkerPool,
    options: PipelineConfig,
    state: Mutex<PipelineState>,
    progress: watch::Sender<Progress>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        classifiers: Arc<dyn ClassifierFactory>,
    ) -> Self {
        let thumbnails = ThumbnailCache::new(config.cache_dir(), config.thumbnail.clone());
        let (progress, _) = watch::channel(Progress::default());
        Self {
            store,
            classifiers,
            reconciler: Reconciler::new(thumbnails.max_width()),
            thumbnails: Arc::new(thumbnails),
            scanner: Scanner::new(config.scan.clone()),
            pool: WorkerPool::new(config.effective_workers()),
            options: config.pipeline.clone(),
            state: Mutex::new(PipelineState::Idle),
            progress,
        }
    }

    /// The thumbnail cache this pipeline writes to.
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Watch progress of the current and future runs.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    fn set_state(&self, state: PipelineState) {
        tracing::trace!("Pipeline state -> {state:?}");
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Run the pipeline over `root`.
    ///
    /// Returns an error only when the directory cannot be scanned or the
    /// store fails. Everything else is reported through the records.
    pub async fn run(
        &self,
        root: &Path,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<PipelineReport, PipelineError> {
        let result = self.execute(root, on_progress).await;
        match &result {
            Ok(_) => self.set_state(PipelineState::Idle),
            Err(e) => {
                tracing::error!("Pipeline failed for {:?}: {e}", root);
                self.set_state(PipelineState::Failed);
            }
        }
        result
    }

    async fn execute(
        &self,
        root: &Path,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<PipelineReport, PipelineError> {
        self.set_state(PipelineState::Scanning);
        let (root, scanned) = self.scan(root).await?;
        let directory = normalize_path(&root);
        tracing::info!("Found {} image(s) in {directory}", scanned.len());

        self.set_state(PipelineState::Reconciling);
        let session = self
            .with_store(move |store| store.get_or_create_session(&directory))
            .await?;
        let existing = self
            .with_store(move |store| store.get_records(session))
            .await?;
        let Reconciliation {
            reusable,
            to_process,
            missing,
        } = self.reconciler.reconcile(&scanned, existing);
        if !missing.is_empty() {
            tracing::info!("{} stored image(s) no longer on disk", missing.len());
        }

        self.set_state(PipelineState::Processing);
        let reused = reusable.len();
        let processed = to_process.len();
        let (fresh, failed_paths) = self.process(session, to_process, on_progress).await;

        self.set_state(PipelineState::Persisting);
        let mut records = reusable;
        records.extend(fresh);
        records.sort_by(|a, b| a.path.cmp(&b.path));

        let snapshot = records.clone();
        if let Err(source) = self
            .with_store(move |store| store.upsert_records(session, &snapshot))
            .await
        {
            return Err(PipelineError::Persist { records, source });
        }

        let unclassified = records.iter().filter(|r| !r.is_classified()).count();
        tracing::info!(
            "Scan complete: {} record(s), {reused} reused, {processed} processed, {unclassified} unclassified, {} failed",
            records.len(),
            failed_paths.len()
        );

        Ok(PipelineReport {
            session,
            records,
            reused,
            processed,
            unclassified,
            failed_paths,
            missing,
        })
    }

    /// Walk the root and annotate each path with an existing thumbnail.
    async fn scan(&self, root: &Path) -> Result<(PathBuf, Vec<ScannedImage>), ScanError> {
        let scanner = self.scanner.clone();
        let thumbnails = Arc::clone(&self.thumbnails);
        let requested = root.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let root = Scanner::resolve_root(&requested)?;
            let scanned: Vec<ScannedImage> = scanner
                .scan(&root)?
                .into_iter()
                .map(|path| ScannedImage {
                    cached_thumbnail: thumbnails.lookup(&path),
                    path,
                })
                .collect();
            Ok::<_, ScanError>((root, scanned))
        })
        .await
        .map_err(|e| ScanError::Unreadable {
            path: root.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        })?
    }

    /// Push `items` through the worker pool in batches, checkpointing each
    /// batch. Returns the folded records and the paths that reported errors.
    async fn process(
        &self,
        session: SessionId,
        items: Vec<WorkItem>,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> (Vec<ImageRecord>, Vec<PathBuf>) {
        let batch_size = self.options.batch_size.max(1);
        let pause = Duration::from_millis(self.options.batch_pause_ms);
        let mut progress = Progress {
            processed: 0,
            total: items.len(),
            batch: 0,
            batches: items.len().div_ceil(batch_size),
        };
        self.report(progress, on_progress);
        if items.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let thumbnails = Arc::clone(&self.thumbnails);
        let classifiers = Arc::clone(&self.classifiers);
        let make_worker = Arc::new(move || {
            let mut job = ImageJob::new(Arc::clone(&thumbnails), classifiers.as_ref());
            move |item: &WorkItem| job.run(item)
        });

        let mut records = Vec::with_capacity(items.len());
        let mut failed = Vec::new();
        let mut checkpointing = true;

        for (index, chunk) in items.chunks(batch_size).enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let results = self
                .pool
                .run(chunk.to_vec(), Arc::clone(&make_worker))
                .await;

            let mut folded = Vec::with_capacity(chunk.len());
            for (item, result) in chunk.iter().zip(results) {
                let result = result.unwrap_or_else(|e| {
                    tracing::warn!("Failed to process {:?}: {e}", item.path);
                    WorkResult::failed(item, e)
                });
                if result.error.is_some() {
                    failed.push(item.path.clone());
                }
                let mut record = item.base_record();
                record.apply(result);
                folded.push(record);
            }

            if checkpointing {
                let batch = folded.clone();
                if let Err(e) = self
                    .with_store(move |store| store.upsert_records(session, &batch))
                    .await
                {
                    tracing::warn!("Checkpoint after batch {} failed: {e}", index + 1);
                    checkpointing = false;
                }
            }
            records.extend(folded);

            progress.processed += chunk.len();
            progress.batch = index + 1;
            tracing::debug!(
                "Batch {}/{} done ({}/{})",
                progress.batch,
                progress.batches,
                progress.processed,
                progress.total
            );
            self.report(progress, on_progress);
        }

        (records, failed)
    }

    fn report(&self, progress: Progress, on_progress: Option<ProgressCallback<'_>>) {
        self.progress.send_replace(progress);
        if let Some(callback) = on_progress {
            callback(progress);
        }
    }

    /// Run a store call on a blocking thread.
    async fn with_store<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
