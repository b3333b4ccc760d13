use std::path::PathBuf;
use thiserror::Error;

/// Core error type for modhost configuration and IO.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read bundle directory {}: {source}", .path.display())]
    BundleRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Module resolution failure.
///
/// Every variant renders a human-readable message; `code()` gives a stable
/// identifier for machine-readable output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("empty module specifier")]
    EmptySpecifier,

    #[error("invalid package name in specifier '{specifier}'")]
    InvalidPackageName { specifier: String },

    #[error("cannot find module '{specifier}' from '{from}'")]
    ModuleNotFound { specifier: String, from: String },

    #[error("directory import '{}' is not supported when importing; specify the file", .path.display())]
    DirectoryImport { path: PathBuf },

    #[error("cannot find module '{}'; import paths must include a file extension", .path.display())]
    ExtensionRequired { path: PathBuf },

    #[error("cannot find package '{name}' from '{from}'")]
    PackageNotFound { name: String, from: String },

    #[error("package subpath '{subpath}' is not exported by '{}'", .package_root.display())]
    ExportNotFound {
        subpath: String,
        package_root: PathBuf,
    },

    #[error("package import specifier '{specifier}' is not defined in '{}'", .package_json.display())]
    ImportNotDefined {
        specifier: String,
        package_json: PathBuf,
    },

    #[error("invalid package target '{target}' for '{key}' in '{}'", .package_root.display())]
    InvalidPackageTarget {
        key: String,
        target: String,
        package_root: PathBuf,
    },

    #[error("unsupported pattern target '{target}': more than one '*'")]
    UnsupportedPattern { target: String },

    #[error("invalid package.json at '{}': {reason}", .path.display())]
    InvalidPackageJson { path: PathBuf, reason: String },
}

impl ResolveError {
    /// Stable upper-snake identifier for this failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptySpecifier => "EMPTY_SPECIFIER",
            Self::InvalidPackageName { .. } => "INVALID_PACKAGE_NAME",
            Self::ModuleNotFound { .. } => "MODULE_NOT_FOUND",
            Self::DirectoryImport { .. } => "DIRECTORY_IMPORT",
            Self::ExtensionRequired { .. } => "EXTENSION_REQUIRED",
            Self::PackageNotFound { .. } => "PACKAGE_NOT_FOUND",
            Self::ExportNotFound { .. } => "EXPORT_NOT_FOUND",
            Self::ImportNotDefined { .. } => "IMPORT_NOT_DEFINED",
            Self::InvalidPackageTarget { .. } => "INVALID_PACKAGE_TARGET",
            Self::UnsupportedPattern { .. } => "UNSUPPORTED_PATTERN",
            Self::InvalidPackageJson { .. } => "INVALID_PACKAGE_JSON",
        }
    }

    /// Whether this is a "not found" class failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound { .. }
                | Self::PackageNotFound { .. }
                | Self::ExportNotFound { .. }
                | Self::ImportNotDefined { .. }
                | Self::ExtensionRequired { .. }
        )
    }
}
