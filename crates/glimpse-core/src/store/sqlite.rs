//! SQLite-backed [`Store`].

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::fingerprint::path_key;
use crate::types::{Classification, Dimensions, ImageRecord, ScanSession, SessionId};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS scans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        directory TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scan_id INTEGER NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
        path TEXT NOT NULL,
        width INTEGER NOT NULL DEFAULT 0,
        height INTEGER NOT NULL DEFAULT 0,
        thumbnail_path TEXT,
        favorite INTEGER NOT NULL DEFAULT 0,
        classification_json TEXT,
        UNIQUE(scan_id, path)
    );
    CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);
";

/// SQLite store. One connection, serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        tracing::debug!("Opened store at {:?}", path);
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Task("store connection poisoned".to_string()))
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(ImageRecord, Option<String>)> {
    let path: String = row.get(0)?;
    let thumbnail: Option<String> = row.get(3)?;
    let record = ImageRecord {
        path: PathBuf::from(path),
        dimensions: Dimensions::new(row.get(1)?, row.get(2)?),
        thumbnail_path: thumbnail.map(PathBuf::from),
        classification: None,
        favorite: row.get(4)?,
    };
    Ok((record, row.get(5)?))
}

impl Store for SqliteStore {
    fn get_or_create_session(&self, directory: &str) -> StoreResult<SessionId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scans (directory) VALUES (?1) ON CONFLICT(directory) DO NOTHING",
            params![directory],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM scans WHERE directory = ?1",
            params![directory],
            |row| row.get(0),
        )?;
        Ok(SessionId(id))
    }

    fn get_records(&self, session: SessionId) -> StoreResult<Vec<ImageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, width, height, thumbnail_path, favorite, classification_json
             FROM files WHERE scan_id = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![session.0], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, json) = row?;
            if let Some(json) = json {
                match serde_json::from_str::<Classification>(&json) {
                    Ok(classification) => record.classification = Some(classification),
                    // Treated as unclassified so the next run redoes it.
                    Err(e) => tracing::warn!(
                        "Unreadable classification for {:?}, will reclassify: {e}",
                        record.path
                    ),
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    fn upsert_records(&self, session: SessionId, records: &[ImageRecord]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO files
                 (scan_id, path, width, height, thumbnail_path, favorite, classification_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(scan_id, path) DO UPDATE SET
                     width = excluded.width,
                     height = excluded.height,
                     thumbnail_path = excluded.thumbnail_path,
                     classification_json =
                         COALESCE(excluded.classification_json, files.classification_json)",
            )?;

            for record in records {
                let Some(path) = path_key(&record.path) else {
                    tracing::warn!("Not storing {:?}: path is not valid UTF-8", record.path);
                    continue;
                };
                let thumbnail = match record.thumbnail_path.as_deref() {
                    Some(thumb) => {
                        let key = path_key(thumb);
                        if key.is_none() {
                            tracing::warn!("Not storing thumbnail {:?}: not valid UTF-8", thumb);
                        }
                        key
                    }
                    None => None,
                };
                let classification = record
                    .classification
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                stmt.execute(params![
                    session.0,
                    path,
                    record.dimensions.width,
                    record.dimensions.height,
                    thumbnail,
                    record.favorite,
                    classification,
                ])?;
            }
        }
        tx.commit()?;
        tracing::trace!("Upserted {} record(s) into session {session}", records.len());
        Ok(())
    }

    fn delete_records(&self, paths: &[PathBuf]) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM files WHERE path = ?1")?;
            for key in paths.iter().filter_map(|p| path_key(p)) {
                removed += stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn thumbnail_paths(&self, paths: &[PathBuf]) -> StoreResult<Vec<PathBuf>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT thumbnail_path FROM files
             WHERE path = ?1 AND thumbnail_path IS NOT NULL",
        )?;

        let mut thumbnails: Vec<PathBuf> = Vec::new();
        for key in paths.iter().filter_map(|p| path_key(p)) {
            let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
            for thumb in rows {
                let thumb = PathBuf::from(thumb?);
                if !thumbnails.contains(&thumb) {
                    thumbnails.push(thumb);
                }
            }
        }
        Ok(thumbnails)
    }

    fn set_favorite(&self, path: &Path, favorite: bool) -> StoreResult<usize> {
        let Some(key) = path_key(path) else {
            return Ok(0);
        };
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE files SET favorite = ?1 WHERE path = ?2",
            params![favorite, key],
        )?;
        Ok(updated)
    }

    fn sessions(&self) -> StoreResult<Vec<ScanSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, directory FROM scans ORDER BY directory")?;
        let rows = stmt.query_map([], |row| {
            Ok(ScanSession {
                id: SessionId(row.get(0)?),
                directory: row.get(1)?,
            })
        })?;
        let sessions = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn delete_session(&self, session: SessionId) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM files WHERE scan_id = ?1", params![session.0])?;
        let existed = tx
            .query_row("SELECT id FROM scans WHERE id = ?1", params![session.0], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        tx.execute("DELETE FROM scans WHERE id = ?1", params![session.0])?;
        tx.commit()?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;

    fn record(path: &str) -> ImageRecord {
        let mut record = ImageRecord::new(path);
        record.dimensions = Dimensions::new(500, 400);
        record
    }

    fn classified(path: &str) -> ImageRecord {
        let mut record = record(path);
        record.classification = Some(Classification::new(vec![Label::new("dog", 0.8)]));
        record
    }

    #[test]
    fn test_session_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.get_or_create_session("/photos").unwrap();
        let b = store.get_or_create_session("/photos").unwrap();
        let c = store.get_or_create_session("/other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.sessions().unwrap().len(), 2);
    }

    #[test]
    fn test_upsert_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = store.get_or_create_session("/photos").unwrap();
        let mut big = classified("/photos/b.png");
        big.thumbnail_path = Some(PathBuf::from("/cache/w600/1.jpg"));

        store
            .upsert_records(session, &[record("/photos/a.jpg"), big.clone()])
            .unwrap();

        let records = store.get_records(session).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record("/photos/a.jpg"));
        assert_eq!(records[1], big);
    }

    #[test]
    fn test_upsert_never_clears_classification() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = store.get_or_create_session("/photos").unwrap();
        store.upsert_records(session, &[classified("/photos/a.jpg")]).unwrap();

        let mut resized = record("/photos/a.jpg");
        resized.dimensions = Dimensions::new(600, 480);
        store.upsert_records(session, &[resized]).unwrap();

        let records = store.get_records(session).unwrap();
        assert!(records[0].is_classified());
        assert_eq!(records[0].dimensions, Dimensions::new(600, 480));
    }

    #[test]
    fn test_upsert_never_writes_favorite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = store.get_or_create_session("/photos").unwrap();
        store.upsert_records(session, &[record("/photos/a.jpg")]).unwrap();

        assert_eq!(store.set_favorite(Path::new("/photos/a.jpg"), true).unwrap(), 1);
        store.upsert_records(session, &[record("/photos/a.jpg")]).unwrap();

        let records = store.get_records(session).unwrap();
        assert!(records[0].favorite);
    }

    #[test]
    fn test_delete_records_across_sessions() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outer = store.get_or_create_session("/photos").unwrap();
        let inner = store.get_or_create_session("/photos/trip").unwrap();
        store.upsert_records(outer, &[record("/photos/trip/x.jpg")]).unwrap();
        store.upsert_records(inner, &[record("/photos/trip/x.jpg")]).unwrap();

        let removed = store
            .delete_records(&[PathBuf::from("/photos/trip/x.jpg"), PathBuf::from("/nope.jpg")])
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_records(outer).unwrap().is_empty());
        assert!(store.get_records(inner).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_backslash_paths_round_trip_exactly() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = store.get_or_create_session("/photos").unwrap();
        store
            .upsert_records(session, &[record("/photos/a\\b.png"), record("/photos/a/b.png")])
            .unwrap();

        let records = store.get_records(session).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.path == Path::new("/photos/a\\b.png")));
        assert!(records.iter().any(|r| r.path == Path::new("/photos/a/b.png")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_never_share_a_row() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let store = SqliteStore::open_in_memory().unwrap();
        let session = store.get_or_create_session("/photos").unwrap();
        let first = ImageRecord::new(Path::new(OsStr::from_bytes(b"/photos/x\xff.png")));
        let second = ImageRecord::new(Path::new(OsStr::from_bytes(b"/photos/x\xfe.png")));
        store
            .upsert_records(session, &[first.clone(), second, record("/photos/ok.png")])
            .unwrap();

        let records = store.get_records(session).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, PathBuf::from("/photos/ok.png"));
        assert_eq!(store.set_favorite(&first.path, true).unwrap(), 0);
    }

    #[test]
    fn test_thumbnail_paths_across_sessions() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outer = store.get_or_create_session("/photos").unwrap();
        let inner = store.get_or_create_session("/photos/trip").unwrap();

        let mut old_width = record("/photos/trip/x.jpg");
        old_width.thumbnail_path = Some(PathBuf::from("/cache/w600/1.jpg"));
        let mut new_width = old_width.clone();
        new_width.thumbnail_path = Some(PathBuf::from("/cache/w300/1.jpg"));
        store.upsert_records(outer, &[old_width, record("/photos/y.jpg")]).unwrap();
        store.upsert_records(inner, &[new_width]).unwrap();

        let mut thumbs = store
            .thumbnail_paths(&[PathBuf::from("/photos/trip/x.jpg"), PathBuf::from("/photos/y.jpg")])
            .unwrap();
        thumbs.sort();
        assert_eq!(
            thumbs,
            vec![PathBuf::from("/cache/w300/1.jpg"), PathBuf::from("/cache/w600/1.jpg")]
        );
    }

    #[test]
    fn test_delete_session() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = store.get_or_create_session("/photos").unwrap();
        store.upsert_records(session, &[record("/photos/a.jpg")]).unwrap();

        assert!(store.delete_session(session).unwrap());
        assert!(!store.delete_session(session).unwrap());
        assert!(store.sessions().unwrap().is_empty());
        assert!(store.get_records(session).unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/glimpse.db");
        let store = SqliteStore::open(&path).unwrap();
        store.get_or_create_session("/photos").unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.sessions().unwrap().len(), 1);
    }
}
