//! On-disk thumbnail cache.
//!
//! Thumbnails are JPEGs named after the fingerprint of the source path and
//! grouped by target width: `<root>/w<max_width>/<fingerprint>.jpg`. A file at
//! a given name never changes, so an existing file is always a valid hit.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::ThumbnailConfig;
use crate::error::ThumbnailError;
use crate::fingerprint::cache_file_name;
use crate::types::Dimensions;

/// How `get_or_create` arrived at its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// An existing cache file was returned
    Hit,
    /// A new thumbnail was written
    Created,
    /// Source is no wider than the target width
    Undersized,
    /// Source format must not be downscaled (e.g. animated GIF)
    Unshrinkable,
    /// Source exceeds the decode ceiling; skip resize and classification
    Oversized,
    /// Source size could not be read; passed through untouched
    ProbeFailed,
}

/// Result of a cache lookup-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub thumbnail_path: Option<PathBuf>,
    /// Thumbnail size when a thumbnail exists, original size otherwise
    pub dimensions: Dimensions,
    pub outcome: ThumbnailOutcome,
}

impl Thumbnail {
    fn passthrough(dimensions: Dimensions, outcome: ThumbnailOutcome) -> Self {
        Self {
            thumbnail_path: None,
            dimensions,
            outcome,
        }
    }
}

/// Thumbnail cache rooted at a directory shared by all workers.
pub struct ThumbnailCache {
    dir: PathBuf,
    config: ThumbnailConfig,
}

impl ThumbnailCache {
    /// Create a cache under `root`. Nothing is touched on disk until the
    /// first thumbnail is written.
    pub fn new(root: impl Into<PathBuf>, config: ThumbnailConfig) -> Self {
        let dir = root.into().join(format!("w{}", config.max_width));
        Self { dir, config }
    }

    /// Directory holding thumbnails of the configured width.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_width(&self) -> u32 {
        self.config.max_width
    }

    /// Where the thumbnail for `source` lives (whether or not it exists).
    pub fn entry_path(&self, source: &Path) -> PathBuf {
        self.dir.join(cache_file_name(source))
    }

    /// Existing thumbnail for `source`, if any. A single `stat`.
    pub fn lookup(&self, source: &Path) -> Option<PathBuf> {
        let path = self.entry_path(source);
        path.is_file().then_some(path)
    }

    /// Read the natural size from the image header without decoding.
    pub fn probe(source: &Path) -> Option<Dimensions> {
        match image::image_dimensions(source) {
            Ok((width, height)) => Some(Dimensions::new(width, height)),
            Err(e) => {
                tracing::debug!("Size probe failed for {:?}: {e}", source);
                None
            }
        }
    }

    /// Return the cached thumbnail for `source`, creating it if needed.
    ///
    /// Probe failures degrade to `0x0` and no thumbnail. Only decode, encode
    /// and write failures are errors, and they concern this file alone.
    pub fn get_or_create(&self, source: &Path) -> Result<Thumbnail, ThumbnailError> {
        let Some(original) = Self::probe(source) else {
            // A previous run may still have cached it.
            if let Some(path) = self.lookup(source) {
                let dimensions = Self::probe(&path).unwrap_or_default();
                return Ok(Thumbnail {
                    thumbnail_path: Some(path),
                    dimensions,
                    outcome: ThumbnailOutcome::Hit,
                });
            }
            return Ok(Thumbnail::passthrough(
                Dimensions::default(),
                ThumbnailOutcome::ProbeFailed,
            ));
        };

        if self.is_oversized(original) {
            tracing::debug!(
                "Skipping {:?}: {} exceeds {}px",
                source,
                original,
                self.config.max_source_dimension
            );
            return Ok(Thumbnail::passthrough(original, ThumbnailOutcome::Oversized));
        }

        if let Some(path) = self.lookup(source) {
            return Ok(Thumbnail {
                thumbnail_path: Some(path),
                dimensions: original.scaled_to_width(self.config.max_width),
                outcome: ThumbnailOutcome::Hit,
            });
        }

        if self.is_unshrinkable(source) {
            return Ok(Thumbnail::passthrough(original, ThumbnailOutcome::Unshrinkable));
        }
        if original.width <= self.config.max_width {
            return Ok(Thumbnail::passthrough(original, ThumbnailOutcome::Undersized));
        }

        let dimensions = original.scaled_to_width(self.config.max_width);
        let path = self.create(source, dimensions)?;
        Ok(Thumbnail {
            thumbnail_path: Some(path),
            dimensions,
            outcome: ThumbnailOutcome::Created,
        })
    }

    /// Delete the cache entry for `source`. Missing entries are fine.
    pub fn remove(&self, source: &Path) -> std::io::Result<bool> {
        remove_if_present(&self.entry_path(source))
    }

    fn is_oversized(&self, dims: Dimensions) -> bool {
        dims.width > self.config.max_source_dimension
            || dims.height > self.config.max_source_dimension
    }

    fn is_unshrinkable(&self, source: &Path) -> bool {
        source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .unshrinkable_formats
                    .iter()
                    .any(|fmt| fmt.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Decode, downscale, encode and atomically store a thumbnail.
    fn create(&self, source: &Path, target: Dimensions) -> Result<PathBuf, ThumbnailError> {
        let image = image::ImageReader::open(source)
            .map_err(|e| ThumbnailError::Decode {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?
            .with_guessed_format()
            .map_err(|e| ThumbnailError::Decode {
                path: source.to_path_buf(),
                message: format!("Cannot detect image format: {e}"),
            })?
            .decode()
            .map_err(|e| ThumbnailError::Decode {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        // JPEG has no alpha channel.
        let resized = image
            .resize_exact(target.width, target.height.max(1), FilterType::Triangle)
            .to_rgb8();

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.config.quality)
            .encode_image(&resized)
            .map_err(|e| ThumbnailError::Encode {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        let target_path = self.entry_path(source);
        self.write_atomic(&target_path, &buffer)?;
        tracing::trace!("Cached {:?} -> {:?}", source, target_path);
        Ok(target_path)
    }

    /// Write through a temp file in the cache directory, then rename, so a
    /// concurrent reader never sees a partial JPEG.
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), ThumbnailError> {
        let write_err = |source: std::io::Error| ThumbnailError::Write {
            path: target.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(target).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// Remove a file, reporting whether it was there.
pub(crate) fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
