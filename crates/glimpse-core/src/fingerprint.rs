//! Stable 32-bit string fingerprints used as cache and store keys.
//!
//! The hash is the classic polynomial string hash (`h = h * 31 + c` over
//! UTF-16 code units, wrapping at signed 32 bits). It is not a digest: it
//! only has to be deterministic across runs and platforms so that cache file
//! names written by one run are found by the next.

use std::path::Path;

/// Returned for empty input. Shares its value with any real hash of -1.
pub const EMPTY_FINGERPRINT: i32 = -1;

/// Fingerprint a string exactly as given (no normalization).
pub fn fingerprint(input: &str) -> i32 {
    if input.is_empty() {
        return EMPTY_FINGERPRINT;
    }
    input
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
}

/// Fingerprint an optional string; `None` behaves like the empty string.
pub fn fingerprint_opt(input: Option<&str>) -> i32 {
    input.map(fingerprint).unwrap_or(EMPTY_FINGERPRINT)
}

/// Exact string key of a path, used by the store.
///
/// `None` when the path is not valid UTF-8: such a path has no lossless
/// string form, and the scanner never yields one. On Windows `\` is folded
/// to `/`; elsewhere a backslash is an ordinary file name character.
pub fn path_key(path: &Path) -> Option<String> {
    path.to_str().map(fold_separators)
}

/// String form of a path for fingerprinting and display.
///
/// Identical to [`path_key`] for UTF-8 paths, lossy otherwise.
pub fn normalize_path(path: &Path) -> String {
    fold_separators(&path.to_string_lossy())
}

#[cfg(windows)]
fn fold_separators(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(not(windows))]
fn fold_separators(path: &str) -> String {
    path.to_string()
}

/// Fingerprint of a normalized path.
pub fn fingerprint_path(path: &Path) -> i32 {
    fingerprint(&normalize_path(path))
}

/// Cache file name for a source image: `{fingerprint}.jpg`.
pub fn cache_file_name(path: &Path) -> String {
    format!("{}.jpg", fingerprint_path(path))
}

/// Per-directory key for flat-file result stores: `{fingerprint}.json`.
pub fn store_key(directory: &Path) -> String {
    format!("{}.json", fingerprint_path(directory))
}
