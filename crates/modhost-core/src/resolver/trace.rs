//! Resolution tracing.
//!
//! Records step-by-step what the resolver looked at, so `modhost resolve
//! --trace` can explain why a specifier resolved (or did not) to a file.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Maximum number of tried paths to record.
pub const MAX_TRIED_PATHS: usize = 20;

/// A single step in the resolution trace.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveTraceStep {
    /// Step name (e.g., "parse_specifier", "match_exports_key", "file_exists")
    pub step: &'static str,
    /// Whether this step succeeded
    pub ok: bool,
    /// Human-readable description of what happened
    pub detail: String,
    /// File path involved in this step, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Export/import condition used (e.g., "import", "require", "default")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Package.json exports/imports key matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Target value from exports/imports map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl ResolveTraceStep {
    /// Create a new trace step.
    pub fn new(step: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            step,
            ok,
            detail: detail.into(),
            path: None,
            condition: None,
            key: None,
            target: None,
            notes: Vec::new(),
        }
    }

    /// Set the path for this step.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the condition for this step.
    pub fn with_condition(mut self, condition: Option<impl Into<String>>) -> Self {
        self.condition = condition.map(Into::into);
        self
    }

    /// Set the key for this step.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the target for this step.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Add a note to this step.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Warning generated during resolution.
#[derive(Debug, Clone, Serialize)]
pub struct TraceWarning {
    /// Warning code (see [`warning_codes`])
    pub code: &'static str,
    pub message: String,
}

impl TraceWarning {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Complete resolution trace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolveTrace {
    /// Ordered list of resolution steps
    pub steps: Vec<ResolveTraceStep>,
    /// Warnings generated during resolution
    pub warnings: Vec<TraceWarning>,
    /// Candidate paths probed, capped at [`MAX_TRIED_PATHS`]
    pub tried: Vec<PathBuf>,
}

impl ResolveTrace {
    /// Create a new empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step to the trace.
    pub fn add_step(&mut self, step: ResolveTraceStep) {
        self.steps.push(step);
    }

    /// Add a warning to the trace.
    pub fn add_warning(&mut self, warning: TraceWarning) {
        self.warnings.push(warning);
    }

    /// Add a simple success step.
    pub fn success(&mut self, step: &'static str, detail: impl Into<String>) {
        self.steps.push(ResolveTraceStep::new(step, true, detail));
    }

    /// Add a simple failure step.
    pub fn failure(&mut self, step: &'static str, detail: impl Into<String>) {
        self.steps.push(ResolveTraceStep::new(step, false, detail));
    }

    /// Record a probed candidate path.
    pub fn tried(&mut self, path: &Path) {
        if self.tried.len() < MAX_TRIED_PATHS {
            self.tried.push(path.to_path_buf());
        }
    }

    /// Whether any warning with `code` was recorded.
    #[must_use]
    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

/// Step names used in resolution tracing.
pub mod steps {
    pub const PARSE_SPECIFIER: &str = "parse_specifier";
    pub const CLASSIFY_SPECIFIER: &str = "classify_specifier";
    pub const RESOLVE_HASH_IMPORT: &str = "resolve_hash_import";
    pub const FIND_PACKAGE_JSON: &str = "find_package_json";
    pub const MATCH_IMPORTS_KEY: &str = "match_imports_key";
    pub const SEARCH_NODE_MODULES: &str = "search_node_modules";
    pub const FIND_PACKAGE_DIR: &str = "find_package_dir";
    pub const MATCH_EXPORTS_KEY: &str = "match_exports_key";
    pub const RESOLVE_MAIN: &str = "resolve_main";
    pub const RESOLVE_INDEX: &str = "resolve_index";
    pub const FILE_EXISTS: &str = "file_exists";
    pub const RESOLVE_PATH: &str = "resolve_path";
    pub const RESOLVE_DIRECTORY: &str = "resolve_directory";
    pub const DETECT_FORMAT: &str = "detect_format";
    pub const FINAL_PATH: &str = "final_path";
}

/// Warning codes used in resolution tracing.
pub mod warning_codes {
    /// A subpath of a package without `exports` was resolved as a literal path.
    pub const MISSING_EXPORTS: &str = "MISSING_EXPORTS";
    /// A bare specifier matched a bundle file and was treated as a path.
    pub const BUNDLE_BARE_PATH: &str = "BUNDLE_BARE_PATH";
    /// A package.json could not be parsed and was treated as absent.
    pub const INVALID_PACKAGE_JSON_IGNORED: &str = "INVALID_PACKAGE_JSON_IGNORED";
}
