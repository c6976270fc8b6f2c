//! Durable storage of scan sessions and image records.
//!
//! The pipeline only talks to the [`Store`] trait. [`SqliteStore`] is the
//! bundled implementation.

mod sqlite;

pub use sqlite::SqliteStore;

use std::path::{Path, PathBuf};

use crate::error::StoreResult;
use crate::types::{ImageRecord, ScanSession, SessionId};

/// Persistence capability used by the orchestrator and the facade.
///
/// Calls are blocking; async callers run them on a blocking thread.
pub trait Store: Send + Sync {
    /// Session for a normalized directory, created on first use.
    fn get_or_create_session(&self, directory: &str) -> StoreResult<SessionId>;

    /// All records of a session, in path order.
    fn get_records(&self, session: SessionId) -> StoreResult<Vec<ImageRecord>>;

    /// Insert or update records by `(session, path)`.
    ///
    /// Geometry is overwritten, a classification is only ever added, and
    /// `favorite` is never written for existing rows. Paths are stored
    /// exactly; records whose path is not valid UTF-8 are skipped.
    fn upsert_records(&self, session: SessionId, records: &[ImageRecord]) -> StoreResult<()>;

    /// Remove the records for `paths` from every session. Returns rows removed.
    fn delete_records(&self, paths: &[PathBuf]) -> StoreResult<usize>;

    /// Thumbnails recorded for `paths` in any session, without duplicates.
    fn thumbnail_paths(&self, paths: &[PathBuf]) -> StoreResult<Vec<PathBuf>>;

    /// Set the favorite flag of `path` in every session holding it.
    /// Returns rows updated.
    fn set_favorite(&self, path: &Path, favorite: bool) -> StoreResult<usize>;

    /// All known sessions.
    fn sessions(&self) -> StoreResult<Vec<ScanSession>>;

    /// Remove a session and its records. Returns whether it existed.
    fn delete_session(&self, session: SessionId) -> StoreResult<bool>;
}
