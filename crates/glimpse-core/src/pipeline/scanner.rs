//! Directory scanning for supported image files.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::error::ScanError;

/// Finds image files under a root directory.
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    /// Create a new scanner.
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Recursively list supported images under `root` as absolute paths.
    ///
    /// Hidden files and hidden directories are skipped. Entries that cannot
    /// be read inside the tree are logged and skipped; only an unusable root
    /// is an error. The result is sorted, but callers should not depend on
    /// any particular order.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let root = Self::resolve_root(root)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(self.config.follow_links)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.is_supported(entry.path()) {
                continue;
            }
            if entry.path().to_str().is_none() {
                tracing::warn!("Skipping {:?}: path is not valid UTF-8", entry.path());
                continue;
            }
            files.push(entry.into_path());
        }

        files.sort();
        tracing::debug!("Scanned {:?}: {} image(s)", root, files.len());
        Ok(files)
    }

    /// Resolve the root to an absolute, canonical directory path.
    pub fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
        if !root.exists() {
            return Err(ScanError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        let canonical = root.canonicalize().map_err(|source| ScanError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;
        // Surface permission problems on the root itself instead of
        // silently returning an empty list.
        std::fs::read_dir(&canonical).map_err(|source| ScanError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;
        if canonical.to_str().is_none() {
            return Err(ScanError::NonUtf8Path(canonical));
        }
        Ok(canonical)
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_is_supported() {
        let scanner = Scanner::new(ScanConfig::default());

        assert!(scanner.is_supported(Path::new("test.jpg")));
        assert!(scanner.is_supported(Path::new("test.JPG")));
        assert!(scanner.is_supported(Path::new("test.jpeg")));
        assert!(scanner.is_supported(Path::new("test.png")));
        assert!(scanner.is_supported(Path::new("test.webp")));
        assert!(scanner.is_supported(Path::new("test.Gif")));
        assert!(!scanner.is_supported(Path::new("test.txt")));
        assert!(!scanner.is_supported(Path::new("test.heic")));
        assert!(!scanner.is_supported(Path::new("jpg")));
    }

    #[test]
    fn test_scan_recursive_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.jpg"));
        touch(&root.join("nested/deeper/b.PNG"));
        touch(&root.join("notes.txt"));
        touch(&root.join(".hidden.jpg"));
        touch(&root.join(".thumbs/c.jpg"));

        let scanner = Scanner::new(ScanConfig::default());
        let files = scanner.scan(root).unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 2, "got {names:?}");
        assert!(names.contains(&"a.jpg".to_string()));
        assert!(names.contains(&"b.PNG".to_string()));
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_scan_empty_directory_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(ScanConfig::default());
        assert!(scanner.scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(ScanConfig::default());
        let err = scanner.scan(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn test_scan_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        touch(&file);
        let scanner = Scanner::new(ScanConfig::default());
        let err = scanner.scan(&file).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_scan_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("ok.jpg"));
        touch(&dir.path().join(OsStr::from_bytes(b"bad\xff.jpg")));
        touch(&dir.path().join(OsStr::from_bytes(b"bad\xfe.jpg")));

        let scanner = Scanner::new(ScanConfig::default());
        let files = scanner.scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("ok.jpg"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_root_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(OsStr::from_bytes(b"photos\xff"));
        fs::create_dir(&root).unwrap();

        let err = Scanner::resolve_root(&root).unwrap_err();
        assert!(matches!(err, ScanError::NonUtf8Path(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_keeps_backslash_names() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a\\b.png"));

        let scanner = Scanner::new(ScanConfig::default());
        let files = scanner.scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name().unwrap(), "a\\b.png");
    }

    #[test]
    fn test_scan_respects_configured_formats() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("b.png"));

        let scanner = Scanner::new(ScanConfig {
            supported_formats: vec!["png".to_string()],
            follow_links: false,
        });
        let files = scanner.scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("b.png"));
    }
}
