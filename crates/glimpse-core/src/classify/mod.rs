//! Visual classification capability.
//!
//! The pipeline never loads a model itself. It asks a [`ClassifierFactory`]
//! for one [`Classifier`] per worker, built on the worker's own thread, and
//! reuses that instance for every image of the worker's batch.

mod remote;
mod retry;

pub use remote::{RemoteClassifier, RemoteClassifierFactory};

use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::types::Classification;

/// Labels one image at a time. Instances are owned by a single worker.
pub trait Classifier {
    /// Classifier name for logging.
    fn name(&self) -> &str;

    /// Classify encoded image bytes (JPEG, PNG, WebP or GIF).
    fn classify(&mut self, image: &[u8]) -> Result<Classification, ClassifyError>;
}

/// Builds classifier instances, once per worker.
pub trait ClassifierFactory: Send + Sync {
    /// Factory name for logging (e.g., "remote", "none").
    fn name(&self) -> &str;

    /// Build a fresh classifier. Called on the worker's thread.
    fn create(&self) -> Result<Box<dyn Classifier>, ClassifyError>;
}

/// Factory used when no classifier is configured. Every worker reports the
/// classifier as unavailable, so images stay unclassified and are picked up
/// again on the next run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClassifier;

impl ClassifierFactory for NoClassifier {
    fn name(&self) -> &str {
        "none"
    }

    fn create(&self) -> Result<Box<dyn Classifier>, ClassifyError> {
        Err(ClassifyError::Unavailable(
            "no classifier configured".to_string(),
        ))
    }
}

/// Pick the classifier factory described by the configuration.
///
/// Must be called from within a Tokio runtime when a remote classifier is
/// configured.
pub fn factory_from_config(
    config: &ClassifierConfig,
) -> Result<Box<dyn ClassifierFactory>, ClassifyError> {
    match &config.remote {
        Some(remote) => Ok(Box::new(RemoteClassifierFactory::new(remote.clone())?)),
        None => {
            tracing::warn!("No classifier configured; images will stay unclassified");
            Ok(Box::new(NoClassifier))
        }
    }
}

/// Guess a MIME type from the leading bytes of an encoded image.
pub(crate) fn sniff_media_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/jpeg",
    }
}
