//! Per-image work: thumbnail, then classification.

use std::path::Path;
use std::sync::Arc;

use super::thumbnail::{ThumbnailCache, ThumbnailOutcome};
use crate::classify::{Classifier, ClassifierFactory};
use crate::error::{ClassifyError, ThumbnailError, WorkError};
use crate::types::{Dimensions, WorkItem, WorkResult};

/// One worker's state: the shared cache plus its own classifier.
pub struct ImageJob {
    thumbnails: Arc<ThumbnailCache>,
    classifier: Result<Box<dyn Classifier>, ClassifyError>,
}

impl ImageJob {
    /// Build the worker state. Called on the worker's thread.
    pub fn new(thumbnails: Arc<ThumbnailCache>, classifiers: &dyn ClassifierFactory) -> Self {
        let classifier = classifiers.create();
        if let Err(e) = &classifier {
            tracing::debug!("Worker running without a classifier: {e}");
        }
        Self {
            thumbnails,
            classifier,
        }
    }

    /// Produce a result for `item`. Errors are recorded in the result; an
    /// `Err` is only returned when the item could not be read at all.
    pub fn run(&mut self, item: &WorkItem) -> Result<WorkResult, WorkError> {
        let (dimensions, thumbnail_path, thumb_error, oversized) = self.geometry(item);

        let mut result = WorkResult {
            path: item.path.clone(),
            dimensions,
            thumbnail_path,
            classification: None,
            error: thumb_error.map(WorkError::from),
        };
        if oversized {
            return Ok(result);
        }
        // Stays unclassified and is picked up again next run.
        let Ok(classifier) = &mut self.classifier else {
            return Ok(result);
        };

        let input = result.thumbnail_path.as_deref().unwrap_or(&item.path);
        let bytes = std::fs::read(input).map_err(|source| WorkError::Read {
            path: input.to_path_buf(),
            source,
        })?;

        match classifier.classify(&bytes) {
            Ok(classification) => result.classification = Some(classification),
            Err(e) => {
                tracing::warn!("Classification failed for {:?}: {e}", item.path);
                result.error = Some(e.into());
            }
        }
        Ok(result)
    }

    /// Dimensions and thumbnail for `item`, reusing a previous run's when its
    /// thumbnail is still on disk.
    fn geometry(
        &self,
        item: &WorkItem,
    ) -> (Dimensions, Option<std::path::PathBuf>, Option<ThumbnailError>, bool) {
        if let Some(prior) = &item.prior {
            if let Some(thumb) = prior.thumbnail_path.as_ref().filter(|p| p.is_file()) {
                return (prior.dimensions, Some(thumb.clone()), None, false);
            }
        }

        match self.thumbnails.get_or_create(&item.path) {
            Ok(thumb) => (
                thumb.dimensions,
                thumb.thumbnail_path,
                None,
                thumb.outcome == ThumbnailOutcome::Oversized,
            ),
            Err(e) => {
                tracing::warn!("Thumbnail failed for {:?}: {e}", item.path);
                (probe_or_unknown(&item.path), None, Some(e), false)
            }
        }
    }
}

fn probe_or_unknown(path: &Path) -> Dimensions {
    ThumbnailCache::probe(path).unwrap_or_default()
}
