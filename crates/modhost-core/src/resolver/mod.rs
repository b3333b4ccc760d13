//! Node.js-compatible module resolver.
//!
//! Resolves relative, absolute, bare and scoped specifiers plus `#imports`
//! against either the filesystem or a bundle, honoring package.json `main`,
//! `exports` and `imports` (conditions and `*` patterns).

mod exports;
mod pkg_json_cache;
mod resolve;
mod specifier;
pub mod trace;

pub use exports::{match_pattern, resolve_exports_target, TargetError, TargetField, TargetMatch};
pub use pkg_json_cache::{PackageCache, PackageDescriptor, PackageLookup, PackageType};
pub use resolve::ModuleResolver;
pub use specifier::{normalize_specifier, parse_bare_specifier, SpecifierKind};
pub use trace::{
    steps as trace_steps, warning_codes as trace_warning_codes, ResolveTrace, ResolveTraceStep,
    TraceWarning, MAX_TRIED_PATHS,
};

use crate::source::StorageKind;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Require-mode probe order.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".json", ".mjs", ".cjs", ".ts", ".tsx", ".mts", ".cts"];

/// Conditions for `import`.
pub const IMPORT_CONDITIONS: &[&str] = &["import", "node", "default"];

/// Conditions for `require`.
pub const REQUIRE_CONDITIONS: &[&str] = &["require", "node", "default"];

/// Whether a specifier is being imported or required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// ESM import: exact files only, `import` condition
    Import,
    /// CJS require: extension and directory probing, `require` condition
    #[default]
    Require,
}

impl ResolveMode {
    /// Ordered export conditions for this mode.
    #[must_use]
    pub fn conditions(self) -> &'static [&'static str] {
        match self {
            Self::Import => IMPORT_CONDITIONS,
            Self::Require => REQUIRE_CONDITIONS,
        }
    }
}

impl std::fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import => write!(f, "import"),
            Self::Require => write!(f, "require"),
        }
    }
}

/// Module format, decided by extension and the nearest package `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Esm,
    Cjs,
    Json,
}

impl std::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Esm => write!(f, "esm"),
            Self::Cjs => write!(f, "cjs"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// A successfully resolved module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedModule {
    pub path: PathBuf,
    pub storage: StorageKind,
    pub format: ModuleFormat,
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Base directory for an entry point (no referrer). Empty for a bundle.
    pub root: PathBuf,
    /// Extensions to probe in Require mode (in order).
    pub extensions: &'static [&'static str],
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            extensions: DEFAULT_EXTENSIONS,
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: &'static [&'static str]) -> Self {
        self.extensions = extensions;
        self
    }
}

/// Whether a path has a TypeScript source extension.
#[must_use]
pub fn is_typescript_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ts" | "tsx" | "mts" | "cts")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_conditions() {
        assert_eq!(ResolveMode::Import.conditions(), &["import", "node", "default"]);
        assert_eq!(ResolveMode::Require.conditions(), &["require", "node", "default"]);
        assert_eq!(ResolveMode::Import.to_string(), "import");
    }

    #[test]
    fn test_resolved_module_serializes() {
        let module = ResolvedModule {
            path: PathBuf::from("/app/a.mjs"),
            storage: StorageKind::Filesystem,
            format: ModuleFormat::Esm,
        };
        let json = serde_json::to_value(&module).unwrap();
        assert_eq!(json["storage"], "filesystem");
        assert_eq!(json["format"], "esm");
    }

    #[test]
    fn test_is_typescript_path() {
        assert!(is_typescript_path(Path::new("a.ts")));
        assert!(is_typescript_path(Path::new("a.cts")));
        assert!(!is_typescript_path(Path::new("a.js")));
        assert!(!is_typescript_path(Path::new("ts")));
    }
}
