//! Partition a fresh scan against stored records.
//!
//! Pure and synchronous: no I/O happens here. The caller annotates each scanned
//! path with any thumbnail already on disk before reconciling.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::types::{ImageRecord, ScannedImage, WorkItem};

/// How a fresh scan splits against what the store already knows.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Fully processed records still present on disk; no work needed
    pub reusable: Vec<ImageRecord>,

    /// New paths and partially processed records
    pub to_process: Vec<WorkItem>,

    /// Stored paths that the scan no longer found
    pub missing: Vec<PathBuf>,
}

impl Reconciliation {
    /// Number of scanned paths covered by this reconciliation.
    pub fn scanned(&self) -> usize {
        self.reusable.len() + self.to_process.len()
    }
}

/// Splits scanned paths into reusable and to-be-processed work.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    thumbnail_width: u32,
}

impl Reconciler {
    pub fn new(thumbnail_width: u32) -> Self {
        Self { thumbnail_width }
    }

    /// Partition `scanned` against `existing`.
    ///
    /// Every scanned path ends up in exactly one of `reusable` or
    /// `to_process`, in scan order. A record is reusable only when it is
    /// classified. Records without a thumbnail pick up one the cache already
    /// holds, which repairs rows written before the thumbnail existed.
    pub fn reconcile(
        &self,
        scanned: &[ScannedImage],
        existing: Vec<ImageRecord>,
    ) -> Reconciliation {
        let mut by_path: HashMap<PathBuf, ImageRecord> = existing
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();

        let mut seen = HashSet::with_capacity(scanned.len());
        let mut result = Reconciliation::default();

        for image in scanned {
            if !seen.insert(image.path.as_path()) {
                continue;
            }

            match by_path.remove(&image.path) {
                Some(mut record) => {
                    self.repair_thumbnail(&mut record, image);
                    if record.is_classified() {
                        result.reusable.push(record);
                    } else {
                        result.to_process.push(WorkItem::resume(record));
                    }
                }
                None => result.to_process.push(WorkItem::new(image.path.clone())),
            }
        }

        let mut missing: Vec<PathBuf> = by_path.into_keys().collect();
        missing.sort();
        result.missing = missing;

        tracing::debug!(
            "Reconciled {} path(s): {} reusable, {} to process, {} missing",
            result.scanned(),
            result.reusable.len(),
            result.to_process.len(),
            result.missing.len()
        );
        result
    }

    fn repair_thumbnail(&self, record: &mut ImageRecord, image: &ScannedImage) {
        if record.thumbnail_path.is_some() {
            return;
        }
        if let Some(cached) = &image.cached_thumbnail {
            record.dimensions = record.dimensions.scaled_to_width(self.thumbnail_width);
            record.thumbnail_path = Some(cached.clone());
        }
    }
}
