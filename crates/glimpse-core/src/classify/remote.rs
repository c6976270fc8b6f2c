//! HTTP classifier backend.
//!
//! Posts the image as base64 JSON and expects a [`Classification`] back:
//! `{"labels": [{"name": "person", "score": 0.93, "bbox": [x, y, w, h]}], "model": "..."}`.
//!
//! Workers run on blocking threads, so each request is driven to completion
//! on the runtime handle captured when the factory was built.

use base64::Engine;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use super::retry;
use super::{sniff_media_type, Classifier, ClassifierFactory};
use crate::config::RemoteClassifierConfig;
use crate::error::ClassifyError;
use crate::types::Classification;

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image: String,
    media_type: &'a str,
}

/// Builds one [`RemoteClassifier`] per worker, all sharing a connection pool.
pub struct RemoteClassifierFactory {
    config: RemoteClassifierConfig,
    api_key: Option<String>,
    client: reqwest::Client,
    handle: Handle,
}

impl RemoteClassifierFactory {
    /// Must be called from within a Tokio runtime.
    pub fn new(config: RemoteClassifierConfig) -> Result<Self, ClassifyError> {
        let handle = Handle::try_current().map_err(|e| {
            ClassifyError::Unavailable(format!("remote classifier needs a Tokio runtime: {e}"))
        })?;
        let api_key = resolve_env_var(&config.api_key);
        if api_key.is_none() {
            tracing::warn!(
                "No API key for remote classifier at {}; sending requests without one",
                config.endpoint
            );
        }
        Ok(Self {
            config,
            api_key,
            client: reqwest::Client::new(),
            handle,
        })
    }
}

impl ClassifierFactory for RemoteClassifierFactory {
    fn name(&self) -> &str {
        "remote"
    }

    fn create(&self) -> Result<Box<dyn Classifier>, ClassifyError> {
        Ok(Box::new(RemoteClassifier {
            config: self.config.clone(),
            api_key: self.api_key.clone(),
            client: self.client.clone(),
            handle: self.handle.clone(),
            last_request: None,
        }))
    }
}

/// A single worker's connection to the classification service.
pub struct RemoteClassifier {
    config: RemoteClassifierConfig,
    api_key: Option<String>,
    client: reqwest::Client,
    handle: Handle,
    last_request: Option<Instant>,
}

impl RemoteClassifier {
    /// Block until at least `min_interval_ms` has passed since the last request.
    fn pace(&mut self) {
        let interval = Duration::from_millis(self.config.min_interval_ms);
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn send(&self, body: &ClassifyRequest<'_>) -> Result<Classification, ClassifyError> {
        let timeout_ms = self.config.timeout_ms;
        self.handle.block_on(async {
            let mut request = self
                .client
                .post(&self.config.endpoint)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = &self.api_key {
                request = request.header("api-key", key);
            }

            let resp = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    ClassifyError::Timeout { timeout_ms }
                } else {
                    ClassifyError::Remote {
                        message: format!("request failed: {e}"),
                        status_code: None,
                    }
                }
            })?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(ClassifyError::Remote {
                    message: format!("HTTP {status}: {text}"),
                    status_code: Some(status.as_u16()),
                });
            }

            resp.json::<Classification>().await.map_err(|e| {
                if e.is_timeout() {
                    ClassifyError::Timeout { timeout_ms }
                } else {
                    ClassifyError::Model(format!("unreadable classifier response: {e}"))
                }
            })
        })
    }
}

impl Classifier for RemoteClassifier {
    fn name(&self) -> &str {
        "remote"
    }

    fn classify(&mut self, image: &[u8]) -> Result<Classification, ClassifyError> {
        let body = ClassifyRequest {
            image: base64::engine::general_purpose::STANDARD.encode(image),
            media_type: sniff_media_type(image),
        };

        let mut attempt = 0;
        loop {
            self.pace();
            match self.send(&body) {
                Ok(classification) => return Ok(classification),
                Err(e) if attempt < self.config.retry_attempts && retry::is_retryable(&e) => {
                    let delay = retry::backoff_duration(attempt, self.config.retry_delay_ms);
                    attempt += 1;
                    tracing::warn!(
                        "Classifier request failed ({e}), retry {attempt}/{} in {:?}",
                        self.config.retry_attempts,
                        delay
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
