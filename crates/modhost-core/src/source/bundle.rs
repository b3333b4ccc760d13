use super::{FileSource, StorageKind};
use crate::error::Error;
use modhost_util::path::{normalize_lexically, to_forward_slashes};
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Index files whose presence makes a bundle directory exist.
const DIR_MARKERS: &[&str] = &["package.json", "index.js", "index.mjs", "index.cjs"];

/// A read-only, flattened map of files.
///
/// Keys are forward-slash paths with no leading slash, so `/app/main.js`,
/// `app/main.js` and `./app/./main.js` all name the same entry. Paths that
/// climb above the bundle root never match.
#[derive(Debug, Clone, Default)]
pub struct BundleSource {
    files: HashMap<String, Vec<u8>>,
}

impl BundleSource {
    /// Create an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bundle from `(path, bytes)` pairs. Unrepresentable paths are skipped.
    pub fn from_entries<I, P, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        let mut bundle = Self::new();
        for (path, bytes) in entries {
            bundle.insert(path.as_ref(), bytes);
        }
        bundle
    }

    /// Snapshot every file below `dir` into a bundle keyed relative to `dir`.
    pub fn from_directory(dir: &Path) -> Result<Self, Error> {
        let files = modhost_util::fs::collect_files(dir).map_err(|source| Error::BundleRead {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut bundle = Self::new();
        for (relative, absolute) in files {
            let bytes = std::fs::read(&absolute).map_err(|source| Error::BundleRead {
                path: absolute.clone(),
                source,
            })?;
            bundle.insert(&relative, bytes);
        }
        Ok(bundle)
    }

    /// Add or replace a file. Returns false if the path escapes the bundle.
    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> bool {
        match normalize_key(path) {
            Some(key) if !key.is_empty() => {
                self.files.insert(key, bytes.into());
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.files.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn lookup(&self, path: &Path) -> Option<&Vec<u8>> {
        let key = normalize_key(&path.to_string_lossy())?;
        self.files.get(&key)
    }
}

/// Map a path to its bundle key, or `None` if it escapes the bundle root.
fn normalize_key(path: &str) -> Option<String> {
    let slashed = to_forward_slashes(path);
    let trimmed = slashed.trim_start_matches('/');
    let normalized = normalize_lexically(Path::new(trimmed))?;
    Some(to_forward_slashes(&normalized.to_string_lossy()))
}

impl FileSource for BundleSource {
    fn kind(&self) -> StorageKind {
        StorageKind::Bundle
    }

    fn exists_file(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    fn exists_dir(&self, path: &Path) -> bool {
        DIR_MARKERS
            .iter()
            .any(|marker| self.lookup(&path.join(marker)).is_some())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.lookup(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' is not in the bundle", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample() -> BundleSource {
        BundleSource::from_entries([
            ("main.js", "require('./lib')"),
            ("/lib/index.js", "module.exports = 1"),
            ("node_modules/pkg/package.json", "{}"),
            ("node_modules/pkg/dist/a.js", ""),
        ])
    }

    #[test]
    fn test_key_normalization() {
        let bundle = sample();
        assert!(bundle.exists_file(Path::new("main.js")));
        assert!(bundle.exists_file(Path::new("/main.js")));
        assert!(bundle.exists_file(Path::new("./lib/../main.js")));
        assert!(bundle.exists_file(Path::new("lib/index.js")));
        assert!(!bundle.exists_file(Path::new("../main.js")));
    }

    #[test]
    fn test_escaping_insert_rejected() {
        let mut bundle = BundleSource::new();
        assert!(!bundle.insert("../outside.js", "x"));
        assert!(!bundle.insert("/", "x"));
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_exists_dir_requires_marker() {
        let bundle = sample();
        assert!(bundle.exists_dir(Path::new("lib")));
        assert!(bundle.exists_dir(Path::new("node_modules/pkg")));
        // Has files but no package.json or index file.
        assert!(!bundle.exists_dir(Path::new("node_modules/pkg/dist")));
        assert!(!bundle.exists_dir(Path::new("missing")));
    }

    #[test]
    fn test_read_file() {
        let bundle = sample();
        assert_eq!(
            bundle.read_file(Path::new("lib/index.js")).unwrap(),
            b"module.exports = 1"
        );
        let err = bundle.read_file(Path::new("nope.js")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_from_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.js"), "app").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();

        let bundle = BundleSource::from_directory(dir.path()).unwrap();
        assert_eq!(bundle.keys(), vec!["package.json", "src/app.js"]);
        assert_eq!(bundle.kind(), StorageKind::Bundle);
        assert!(bundle.exists_dir(Path::new("")));
    }
}
