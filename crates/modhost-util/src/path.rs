//! Lexical path helpers shared by the filesystem and bundle backends.
//!
//! None of these functions touch the filesystem; `absolutize` reads the
//! process working directory.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Replace every backslash with a forward slash.
#[must_use]
pub fn to_forward_slashes(s: &str) -> String {
    s.replace('\\', "/")
}

/// Strip a leading `file://` scheme, if any.
///
/// `file:///abs/path` becomes `/abs/path`; `file:///C:/x` becomes `C:/x`.
#[must_use]
pub fn strip_file_url(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("file://") else {
        return s;
    };
    let bytes = rest.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        &rest[1..]
    } else {
        rest
    }
}

/// Check for a Windows drive-letter path such as `C:/x` or `C:\x`.
#[must_use]
pub fn is_windows_absolute(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

/// Normalize a path by removing `.` and resolving `..` components.
///
/// For rooted paths a `..` at the root is dropped, mirroring how `/..` is `/`.
/// For relative paths, a `..` that would climb above the starting point
/// returns `None`.
#[must_use]
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut result = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => result.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    result.pop();
                    depth -= 1;
                } else if !result.has_root() {
                    return None;
                }
            }
            Component::Normal(name) => {
                result.push(name);
                depth += 1;
            }
        }
    }

    Some(result)
}

/// Anchor a relative path at the current working directory.
///
/// Absolute paths are returned as they are. No `..` is resolved here.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Render a path with forward slashes for display and map keys.
#[must_use]
pub fn display_slash(path: &Path) -> String {
    to_forward_slashes(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_forward_slashes() {
        assert_eq!(to_forward_slashes(r"a\b\c.js"), "a/b/c.js");
        assert_eq!(to_forward_slashes("a/b"), "a/b");
    }

    #[test]
    fn test_strip_file_url() {
        assert_eq!(strip_file_url("file:///srv/app/main.js"), "/srv/app/main.js");
        assert_eq!(strip_file_url("file:///C:/app/main.js"), "C:/app/main.js");
        assert_eq!(strip_file_url("./main.js"), "./main.js");
    }

    #[test]
    fn test_is_windows_absolute() {
        assert!(is_windows_absolute("C:/x"));
        assert!(is_windows_absolute(r"d:\x"));
        assert!(!is_windows_absolute("C:"));
        assert!(!is_windows_absolute("/x"));
        assert!(!is_windows_absolute("lodash"));
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(
            normalize_lexically(Path::new("a/./b/../c.js")),
            Some(PathBuf::from("a/c.js"))
        );
        assert_eq!(normalize_lexically(Path::new("./x.js")), Some(PathBuf::from("x.js")));
        assert_eq!(normalize_lexically(Path::new("")), Some(PathBuf::new()));
    }

    #[test]
    fn test_normalize_relative_escape_rejected() {
        assert_eq!(normalize_lexically(Path::new("../x.js")), None);
        assert_eq!(normalize_lexically(Path::new("a/../../x.js")), None);
    }

    #[test]
    fn test_absolutize() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolutize(Path::new("a/b.js")).unwrap(), cwd.join("a/b.js"));
        assert_eq!(absolutize(&cwd.join("x.js")).unwrap(), cwd.join("x.js"));

        let escaped = absolutize(Path::new("../x.js")).unwrap();
        assert!(escaped.is_absolute());
        assert!(normalize_lexically(&escaped).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_absolute_clamps_at_root() {
        assert_eq!(
            normalize_lexically(Path::new("/srv/../../etc/x")),
            Some(PathBuf::from("/etc/x"))
        );
    }
}
