use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Collect every regular file below `root`, sorted by relative path.
///
/// Returns `(relative, absolute)` pairs. Relative paths use forward slashes
/// regardless of platform. Symlinks are not followed.
///
/// # Errors
/// Returns an error if a directory entry cannot be read.
pub fn collect_files(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = crate::path::to_forward_slashes(&relative.to_string_lossy());
        files.push((relative, entry.path().to_path_buf()));
    }

    Ok(files)
}
