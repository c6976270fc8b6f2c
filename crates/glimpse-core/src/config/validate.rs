//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    ///
    /// Runs on load; callers that change values afterwards run it again.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "scan.supported_formats must not be empty".into(),
            ));
        }
        if self.thumbnail.max_width == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.max_width must be > 0".into(),
            ));
        }
        if self.thumbnail.quality == 0 || self.thumbnail.quality > 100 {
            return Err(ConfigError::ValidationError(
                "thumbnail.quality must be between 1 and 100".into(),
            ));
        }
        if self.thumbnail.max_source_dimension < self.thumbnail.max_width {
            return Err(ConfigError::ValidationError(
                "thumbnail.max_source_dimension must be >= thumbnail.max_width".into(),
            ));
        }
        if self.pipeline.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.batch_size must be > 0".into(),
            ));
        }
        if let Some(remote) = &self.classifier.remote {
            if remote.endpoint.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "classifier.remote.endpoint must not be empty".into(),
                ));
            }
            if remote.timeout_ms == 0 {
                return Err(ConfigError::ValidationError(
                    "classifier.remote.timeout_ms must be > 0".into(),
                ));
            }
        }
        Ok(())
    }
}
