//! CLI command implementations.

pub mod config;
pub mod delete;
pub mod favorite;
pub mod scan;
pub mod sessions;

use glimpse_core::classify::NoClassifier;
use glimpse_core::{Config, Glimpse};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Open the engine for commands that never classify.
pub(crate) fn open_store_only(config: Config) -> anyhow::Result<Glimpse> {
    Ok(Glimpse::open(config, Arc::new(NoClassifier))?)
}

/// Records are keyed by canonical paths; resolve user input the same way.
/// Paths that no longer exist are used as given.
pub(crate) fn resolve_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
