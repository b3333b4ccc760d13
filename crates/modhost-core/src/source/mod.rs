//! Read-only file sources the resolver runs against.
//!
//! Two backends share one trait: the real filesystem ([`DiskSource`]) and an
//! in-memory bundle of files ([`BundleSource`]).

mod bundle;
mod disk;

pub use bundle::BundleSource;
pub use disk::DiskSource;

use serde::Serialize;
use std::io;
use std::path::Path;

/// Where a resolved module lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Filesystem,
    Bundle,
}

impl StorageKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Bundle => "bundle",
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Existence checks and reads over a storage backend.
///
/// Implementations have no side effects.
pub trait FileSource: std::fmt::Debug {
    /// Which backend this is.
    fn kind(&self) -> StorageKind;

    /// Whether `path` names a readable file.
    fn exists_file(&self, path: &Path) -> bool;

    /// Whether `path` names a directory.
    fn exists_dir(&self, path: &Path) -> bool;

    /// Read the raw bytes of a file.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}
