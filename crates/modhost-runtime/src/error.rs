use modhost_core::ResolveError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure loading or evaluating a module.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot load '{}': no TypeScript transpiler is available", .path.display())]
    TypeScriptUnavailable { path: PathBuf },

    #[error("TypeScript transpile of '{}' failed: {message}", .path.display())]
    TypeScript { path: PathBuf, message: String },

    #[error("failed to compile '{}'", .path.display())]
    Compile { path: PathBuf },

    #[error("uncaught exception while evaluating '{}'", .path.display())]
    Exception { path: PathBuf },

    #[error("require() of ES module '{}' is not supported; use import instead", .path.display())]
    RequireEsm { path: PathBuf },

    #[error("failed to evaluate entry module '{}'", .path.display())]
    EntryFailed { path: PathBuf },
}

impl ModuleError {
    /// Whether the engine already holds an exception describing this failure.
    #[must_use]
    pub fn is_pending_exception(&self) -> bool {
        matches!(
            self,
            Self::Compile { .. } | Self::Exception { .. } | Self::EntryFailed { .. }
        )
    }

    /// Stable upper-snake identifier for this failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolve(e) => e.code(),
            Self::Read { .. } => "READ_FAILED",
            Self::TypeScriptUnavailable { .. } => "TYPESCRIPT_UNAVAILABLE",
            Self::TypeScript { .. } => "TYPESCRIPT_FAILED",
            Self::Compile { .. } => "COMPILE_FAILED",
            Self::Exception { .. } => "EXCEPTION",
            Self::RequireEsm { .. } => "REQUIRE_ESM",
            Self::EntryFailed { .. } => "ENTRY_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_errors_pass_through() {
        let err = ModuleError::from(ResolveError::EmptySpecifier);
        assert_eq!(err.to_string(), "empty module specifier");
        assert_eq!(err.code(), "EMPTY_SPECIFIER");
        assert!(!err.is_pending_exception());
    }

    #[test]
    fn test_require_esm_message() {
        let err = ModuleError::RequireEsm {
            path: PathBuf::from("/app/esm.mjs"),
        };
        assert!(err.to_string().contains("require() of ES module '/app/esm.mjs'"));
        assert!(ModuleError::Exception { path: PathBuf::new() }.is_pending_exception());
    }
}
