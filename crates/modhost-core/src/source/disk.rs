use super::{FileSource, StorageKind};
use std::io;
use std::path::Path;

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSource;

impl DiskSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FileSource for DiskSource {
    fn kind(&self) -> StorageKind {
        StorageKind::Filesystem
    }

    fn exists_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn exists_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_disk_source() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "module.exports = 1;").unwrap();

        let source = DiskSource::new();
        assert_eq!(source.kind(), StorageKind::Filesystem);
        assert!(source.exists_file(&file));
        assert!(!source.exists_dir(&file));
        assert!(source.exists_dir(dir.path()));
        assert!(!source.exists_file(dir.path()));
        assert_eq!(source.read_file(&file).unwrap(), b"module.exports = 1;");
        assert!(source.read_file(&dir.path().join("missing.js")).is_err());
    }
}
