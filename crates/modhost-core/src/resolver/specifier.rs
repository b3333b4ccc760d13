//! Specifier normalization and classification.

use crate::error::ResolveError;
use modhost_util::path::{is_windows_absolute, strip_file_url, to_forward_slashes};

/// Syntactic class of a module specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `./x`, `../x`, `.` or `..`
    Relative,
    /// `/x`
    Absolute,
    /// `C:/x`
    WindowsAbsolute,
    /// `lodash`, `lodash/fp`
    Bare,
    /// `@scope/pkg`, `@scope/pkg/sub`
    Scoped,
    /// `#internal/x`
    HashImport,
    /// `file:///x`
    FileUrl,
}

impl SpecifierKind {
    /// Classify a raw (un-normalized) specifier.
    #[must_use]
    pub fn of(raw: &str) -> Self {
        if raw.starts_with("file://") {
            return Self::FileUrl;
        }
        let spec = to_forward_slashes(raw);
        if spec.starts_with('#') {
            Self::HashImport
        } else if spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
        {
            Self::Relative
        } else if spec.starts_with('/') {
            Self::Absolute
        } else if is_windows_absolute(&spec) {
            Self::WindowsAbsolute
        } else if spec.starts_with('@') {
            Self::Scoped
        } else {
            Self::Bare
        }
    }

    /// Whether this names a file path rather than a package.
    #[must_use]
    pub fn is_path(self) -> bool {
        matches!(
            self,
            Self::Relative | Self::Absolute | Self::WindowsAbsolute | Self::FileUrl
        )
    }
}

/// Strip a `file://` prefix and map backslashes to forward slashes.
#[must_use]
pub fn normalize_specifier(raw: &str) -> String {
    to_forward_slashes(strip_file_url(raw))
}

/// Split a bare specifier into package name and `./`-prefixed subpath.
///
/// `"@scope/pkg/sub/path"` gives `("@scope/pkg", "./sub/path")`; `"lodash"`
/// gives `("lodash", ".")`.
pub fn parse_bare_specifier(spec: &str) -> Result<(&str, String), ResolveError> {
    let invalid = || ResolveError::InvalidPackageName {
        specifier: spec.to_string(),
    };

    let name_end = if spec.starts_with('@') {
        let slash = spec.find('/').ok_or_else(invalid)?;
        if slash == 1 {
            return Err(invalid());
        }
        spec[slash + 1..]
            .find('/')
            .map_or(spec.len(), |i| slash + 1 + i)
    } else {
        spec.find('/').unwrap_or(spec.len())
    };

    let name = &spec[..name_end];
    let last_segment = name.rsplit('/').next().unwrap_or(name);
    if name.is_empty()
        || last_segment.is_empty()
        || name.starts_with('.')
        || name.contains('\\')
        || name.contains('%')
    {
        return Err(invalid());
    }

    let rest = &spec[name_end..];
    let subpath = if rest.is_empty() || rest == "/" {
        ".".to_string()
    } else {
        format!(".{rest}")
    };

    Ok((name, subpath))
}
