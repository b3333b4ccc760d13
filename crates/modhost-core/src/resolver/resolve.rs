//! The resolution algorithm.
//!
//! Supports:
//! - Relative, absolute, drive-letter and `file://` specifiers
//! - Bare and scoped specifiers with `node_modules` lookup
//! - Require-mode extension and directory probing
//! - package.json `exports` (conditions, subpaths, `*` patterns)
//! - package.json `imports` (`#`-prefixed specifiers)
//! - Bundle-only relaxation: a bare name matching a bundle file is a path

use super::exports::{resolve_exports_target, TargetError, TargetField, TargetMatch};
use super::pkg_json_cache::{PackageCache, PackageDescriptor, PackageLookup};
use super::specifier::{normalize_specifier, parse_bare_specifier, SpecifierKind};
use super::trace::{steps, warning_codes, ResolveTrace, ResolveTraceStep, TraceWarning};
use super::{ModuleFormat, ResolveMode, ResolvedModule, ResolverConfig};
use crate::error::ResolveError;
use crate::source::{BundleSource, DiskSource, FileSource, StorageKind};
use modhost_util::path::{absolutize, display_slash, normalize_lexically, to_forward_slashes};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Resolves specifiers against one file source.
///
/// Package descriptors are memoized for the resolver's lifetime.
#[derive(Debug)]
pub struct ModuleResolver {
    source: Rc<dyn FileSource>,
    config: ResolverConfig,
    packages: PackageCache,
}

impl ModuleResolver {
    #[must_use]
    pub fn new(source: Rc<dyn FileSource>, config: ResolverConfig) -> Self {
        Self {
            source,
            config,
            packages: PackageCache::new(),
        }
    }

    /// Resolver over the real filesystem, with entry points relative to `root`.
    #[must_use]
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self::new(Rc::new(DiskSource::new()), ResolverConfig::new(root))
    }

    /// Resolver over an in-memory bundle.
    #[must_use]
    pub fn bundle(bundle: BundleSource) -> Self {
        Self::new(Rc::new(bundle), ResolverConfig::default())
    }

    #[must_use]
    pub fn source(&self) -> &dyn FileSource {
        self.source.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    #[must_use]
    pub fn packages(&self) -> &PackageCache {
        &self.packages
    }

    #[must_use]
    pub fn storage(&self) -> StorageKind {
        self.source.kind()
    }

    /// Resolve `specifier` as seen from the file `referrer` (or the configured
    /// root when there is none).
    pub fn resolve(
        &self,
        specifier: &str,
        referrer: Option<&Path>,
        mode: ResolveMode,
    ) -> Result<ResolvedModule, ResolveError> {
        let mut trace = ResolveTrace::new();
        self.resolve_with_trace(specifier, referrer, mode, &mut trace)
    }

    /// Same as [`resolve`](Self::resolve), recording each step into `trace`.
    pub fn resolve_with_trace(
        &self,
        specifier: &str,
        referrer: Option<&Path>,
        mode: ResolveMode,
        trace: &mut ResolveTrace,
    ) -> Result<ResolvedModule, ResolveError> {
        if specifier.is_empty() {
            trace.failure(steps::PARSE_SPECIFIER, "empty specifier");
            return Err(ResolveError::EmptySpecifier);
        }

        let kind = SpecifierKind::of(specifier);
        let spec = normalize_specifier(specifier);
        trace.add_step(
            ResolveTraceStep::new(steps::PARSE_SPECIFIER, true, format!("{spec} ({mode})"))
                .with_note(format!("{kind:?}")),
        );

        let base_dir = self.base_dir(referrer);

        let path = match kind {
            SpecifierKind::HashImport => self.resolve_package_import(&spec, &base_dir, mode, trace)?,
            SpecifierKind::WindowsAbsolute if self.storage() == StorageKind::Bundle => {
                self.resolve_bare(&spec, &base_dir, mode, trace)?
            }
            k if k.is_path() => self.resolve_path_specifier(&spec, k, &base_dir, mode, trace)?,
            _ => {
                if let Some(path) = self.bundle_file_for_bare(&spec, &base_dir) {
                    trace.add_warning(TraceWarning::new(
                        warning_codes::BUNDLE_BARE_PATH,
                        format!("'{spec}' matched bundle file '{}'", display_slash(&path)),
                    ));
                    path
                } else {
                    self.resolve_bare(&spec, &base_dir, mode, trace)?
                }
            }
        };

        let format = self.detect_format(&path);
        trace.add_step(
            ResolveTraceStep::new(steps::DETECT_FORMAT, true, format.to_string()).with_path(&path),
        );
        trace.add_step(ResolveTraceStep::new(steps::FINAL_PATH, true, "resolved").with_path(&path));

        Ok(ResolvedModule {
            path,
            storage: self.storage(),
            format,
        })
    }

    /// Decide a module's format from its extension and the nearest package `type`.
    #[must_use]
    pub fn detect_format(&self, path: &Path) -> ModuleFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mjs" | "mts") => ModuleFormat::Esm,
            Some("cjs" | "cts") => ModuleFormat::Cjs,
            Some("json") => ModuleFormat::Json,
            Some("js" | "ts" | "tsx") => {
                let dir = path.parent().unwrap_or_else(|| Path::new(""));
                match self.packages.find_nearest(self.source(), dir) {
                    PackageLookup::Loaded(desc) if desc.is_module() => ModuleFormat::Esm,
                    _ => ModuleFormat::Cjs,
                }
            }
            _ => ModuleFormat::Cjs,
        }
    }

    fn base_dir(&self, referrer: Option<&Path>) -> PathBuf {
        referrer
            .and_then(Path::parent)
            .and_then(|dir| self.normalize(dir))
            .unwrap_or_else(|| self.config.root.clone())
    }

    /// Lexically normalize a candidate path for this source.
    ///
    /// Bundle paths are kept relative to the bundle root. `None` means the
    /// path escapes the source's namespace.
    fn normalize(&self, path: &Path) -> Option<PathBuf> {
        match self.storage() {
            StorageKind::Filesystem => normalize_lexically(&absolutize(path).ok()?),
            StorageKind::Bundle => {
                let slashed = to_forward_slashes(&path.to_string_lossy());
                normalize_lexically(Path::new(slashed.trim_start_matches('/')))
            }
        }
    }

    fn not_found(specifier: &str, from: &Path) -> ResolveError {
        ResolveError::ModuleNotFound {
            specifier: specifier.to_string(),
            from: display_slash(from),
        }
    }

    fn resolve_path_specifier(
        &self,
        spec: &str,
        kind: SpecifierKind,
        base_dir: &Path,
        mode: ResolveMode,
        trace: &mut ResolveTrace,
    ) -> Result<PathBuf, ResolveError> {
        let joined = match kind {
            SpecifierKind::Relative => base_dir.join(spec),
            _ => PathBuf::from(spec),
        };
        let target = self
            .normalize(&joined)
            .ok_or_else(|| Self::not_found(spec, base_dir))?;

        trace.add_step(
            ResolveTraceStep::new(steps::RESOLVE_PATH, true, format!("{kind:?} path"))
                .with_path(&target),
        );
        self.resolve_path_target(&target, spec, base_dir, mode, trace)
    }

    /// Resolve a concrete path according to mode rules.
    fn resolve_path_target(
        &self,
        target: &Path,
        spec: &str,
        from: &Path,
        mode: ResolveMode,
        trace: &mut ResolveTrace,
    ) -> Result<PathBuf, ResolveError> {
        match mode {
            ResolveMode::Import => {
                trace.tried(target);
                if self.source.exists_file(target) {
                    trace.add_step(ResolveTraceStep::new(steps::FILE_EXISTS, true, "exact file").with_path(target));
                    return Ok(target.to_path_buf());
                }
                trace.add_step(ResolveTraceStep::new(steps::FILE_EXISTS, false, "no exact file").with_path(target));

                if self.source.exists_dir(target) {
                    return Err(ResolveError::DirectoryImport {
                        path: target.to_path_buf(),
                    });
                }
                if target.extension().is_none() {
                    return Err(ResolveError::ExtensionRequired {
                        path: target.to_path_buf(),
                    });
                }
                Err(Self::not_found(spec, from))
            }
            ResolveMode::Require => {
                if let Some(found) = self.load_as_file(target, trace) {
                    return Ok(found);
                }
                if let Some(found) = self.load_as_directory(target, trace) {
                    return Ok(found);
                }
                Err(Self::not_found(spec, from))
            }
        }
    }

    /// Exact name, then each configured extension appended.
    fn load_as_file(&self, target: &Path, trace: &mut ResolveTrace) -> Option<PathBuf> {
        trace.tried(target);
        if self.source.exists_file(target) {
            trace.add_step(ResolveTraceStep::new(steps::FILE_EXISTS, true, "exact file").with_path(target));
            return Some(target.to_path_buf());
        }

        for ext in self.config.extensions {
            let candidate = append_extension(target, ext);
            trace.tried(&candidate);
            if self.source.exists_file(&candidate) {
                trace.add_step(
                    ResolveTraceStep::new(steps::FILE_EXISTS, true, format!("probed {ext}"))
                        .with_path(&candidate),
                );
                return Some(candidate);
            }
        }

        None
    }

    /// `package.json` main, then `index` with extension probing.
    fn load_as_directory(&self, dir: &Path, trace: &mut ResolveTrace) -> Option<PathBuf> {
        if !self.source.exists_dir(dir) {
            return None;
        }

        match self.packages.load(self.source(), dir) {
            PackageLookup::Loaded(desc) => {
                if let Some(found) = self.load_main(&desc, trace) {
                    return Some(found);
                }
            }
            PackageLookup::Invalid(reason) => trace.add_warning(TraceWarning::new(
                warning_codes::INVALID_PACKAGE_JSON_IGNORED,
                format!("{}: {reason}", display_slash(&dir.join("package.json"))),
            )),
            PackageLookup::Missing => {}
        }

        trace.add_step(ResolveTraceStep::new(steps::RESOLVE_DIRECTORY, true, "index probe").with_path(dir));
        self.load_index(dir, trace)
    }

    fn load_index(&self, dir: &Path, trace: &mut ResolveTrace) -> Option<PathBuf> {
        for ext in self.config.extensions {
            let index = dir.join(format!("index{ext}"));
            trace.tried(&index);
            if self.source.exists_file(&index) {
                trace.add_step(ResolveTraceStep::new(steps::RESOLVE_INDEX, true, "found index").with_path(&index));
                return Some(index);
            }
        }
        None
    }

    /// Legacy `main` resolution: Require-style probing whatever the mode.
    fn load_main(&self, desc: &PackageDescriptor, trace: &mut ResolveTrace) -> Option<PathBuf> {
        let main = desc.main.as_deref()?;
        let main_path = self.normalize(&desc.root.join(main))?;

        let found = self
            .load_as_file(&main_path, trace)
            .or_else(|| self.load_index(&main_path, trace));

        let step = ResolveTraceStep::new(steps::RESOLVE_MAIN, found.is_some(), format!("main: {main}"))
            .with_path(&main_path);
        trace.add_step(step);
        found
    }

    /// Bundle relaxation: a bare name that is also a bundle file path.
    fn bundle_file_for_bare(&self, spec: &str, base_dir: &Path) -> Option<PathBuf> {
        if self.storage() != StorageKind::Bundle {
            return None;
        }

        [base_dir, self.config.root.as_path()]
            .into_iter()
            .filter_map(|base| self.normalize(&base.join(spec)))
            .find(|candidate| self.source.exists_file(candidate))
    }

    /// Walk up from `base_dir` looking for `node_modules/<name>`.
    fn find_package_root(&self, name: &str, base_dir: &Path, trace: &mut ResolveTrace) -> Option<PathBuf> {
        for dir in base_dir.ancestors() {
            // Never look in node_modules/node_modules
            if dir.file_name().is_some_and(|n| n == "node_modules") {
                continue;
            }

            let candidate = dir.join("node_modules").join(name);
            trace.tried(&candidate);
            if self.source.exists_dir(&candidate) {
                trace.add_step(
                    ResolveTraceStep::new(steps::FIND_PACKAGE_DIR, true, format!("found {name}"))
                        .with_path(&candidate),
                );
                return Some(candidate);
            }
        }

        trace.failure(steps::SEARCH_NODE_MODULES, format!("no node_modules/{name}"));
        None
    }

    fn resolve_bare(
        &self,
        spec: &str,
        base_dir: &Path,
        mode: ResolveMode,
        trace: &mut ResolveTrace,
    ) -> Result<PathBuf, ResolveError> {
        let (name, subpath) = parse_bare_specifier(spec)?;
        trace.add_step(
            ResolveTraceStep::new(steps::CLASSIFY_SPECIFIER, true, "bare specifier")
                .with_note(format!("package: {name}"))
                .with_note(format!("subpath: {subpath}")),
        );

        let root = self
            .find_package_root(name, base_dir, trace)
            .ok_or_else(|| ResolveError::PackageNotFound {
                name: name.to_string(),
                from: display_slash(base_dir),
            })?;

        let desc = match self.packages.load(self.source(), &root) {
            PackageLookup::Loaded(desc) => Some(desc),
            PackageLookup::Missing => None,
            PackageLookup::Invalid(reason) => {
                return Err(ResolveError::InvalidPackageJson {
                    path: root.join("package.json"),
                    reason,
                })
            }
        };

        self.resolve_package_subpath(&root, desc.as_deref(), &subpath, spec, mode, trace)
    }

    fn resolve_package_subpath(
        &self,
        root: &Path,
        desc: Option<&PackageDescriptor>,
        subpath: &str,
        spec: &str,
        mode: ResolveMode,
        trace: &mut ResolveTrace,
    ) -> Result<PathBuf, ResolveError> {
        if let Some(exports) = desc.and_then(|d| d.exports.as_ref()) {
            let matched = resolve_exports_target(exports, subpath, mode.conditions(), TargetField::Exports)
                .map_err(|e| target_error(e, subpath, root))?;

            let Some(matched) = matched else {
                trace.failure(steps::MATCH_EXPORTS_KEY, format!("no exports entry for {subpath}"));
                return Err(ResolveError::ExportNotFound {
                    subpath: subpath.to_string(),
                    package_root: root.to_path_buf(),
                });
            };
            trace.add_step(match_step(steps::MATCH_EXPORTS_KEY, &matched));

            return self.resolve_package_file(root, &matched.target, subpath, spec, trace);
        }

        if subpath != "." {
            trace.add_warning(TraceWarning::new(
                warning_codes::MISSING_EXPORTS,
                format!("package has no exports; resolving {subpath} as a literal path"),
            ));
            let target = self
                .normalize(&root.join(subpath))
                .ok_or_else(|| Self::not_found(spec, root))?;
            return self.resolve_path_target(&target, spec, root, mode, trace);
        }

        if let Some(found) = desc.and_then(|d| self.load_main(d, trace)) {
            return Ok(found);
        }

        let found = match mode {
            ResolveMode::Require => self.load_index(root, trace),
            ResolveMode::Import => {
                let index = root.join("index.js");
                trace.tried(&index);
                self.source.exists_file(&index).then_some(index)
            }
        };
        found.ok_or_else(|| Self::not_found(spec, root))
    }

    /// A `./`-relative exports/imports target must be an existing file.
    fn resolve_package_file(
        &self,
        root: &Path,
        target: &str,
        key: &str,
        spec: &str,
        trace: &mut ResolveTrace,
    ) -> Result<PathBuf, ResolveError> {
        let path = self
            .normalize(&root.join(target))
            .ok_or_else(|| ResolveError::InvalidPackageTarget {
                key: key.to_string(),
                target: target.to_string(),
                package_root: root.to_path_buf(),
            })?;

        trace.tried(&path);
        if self.source.exists_file(&path) {
            trace.add_step(ResolveTraceStep::new(steps::FILE_EXISTS, true, "target exists").with_path(&path));
            Ok(path)
        } else {
            trace.add_step(ResolveTraceStep::new(steps::FILE_EXISTS, false, "target missing").with_path(&path));
            Err(Self::not_found(spec, root))
        }
    }

    fn resolve_package_import(
        &self,
        spec: &str,
        base_dir: &Path,
        mode: ResolveMode,
        trace: &mut ResolveTrace,
    ) -> Result<PathBuf, ResolveError> {
        let mut nearest_manifest = None;
        let mut owner = None;

        for dir in base_dir.ancestors() {
            if let PackageLookup::Loaded(desc) = self.packages.load(self.source(), dir) {
                nearest_manifest.get_or_insert_with(|| desc.manifest_path());
                if desc.has_imports() {
                    owner = Some(desc);
                    break;
                }
            }
        }

        let not_defined = |package_json: PathBuf| ResolveError::ImportNotDefined {
            specifier: spec.to_string(),
            package_json,
        };

        let Some(desc) = owner else {
            trace.failure(steps::FIND_PACKAGE_JSON, "no package.json declares imports");
            return Err(not_defined(
                nearest_manifest.unwrap_or_else(|| base_dir.join("package.json")),
            ));
        };
        trace.add_step(
            ResolveTraceStep::new(steps::FIND_PACKAGE_JSON, true, "imports owner")
                .with_path(desc.manifest_path()),
        );

        let Some(imports) = desc.imports.as_ref() else {
            return Err(not_defined(desc.manifest_path()));
        };

        let matched = resolve_exports_target(imports, spec, mode.conditions(), TargetField::Imports)
            .map_err(|e| target_error(e, spec, &desc.root))?;
        let Some(matched) = matched else {
            trace.failure(steps::MATCH_IMPORTS_KEY, format!("no imports entry for {spec}"));
            return Err(not_defined(desc.manifest_path()));
        };
        trace.add_step(match_step(steps::MATCH_IMPORTS_KEY, &matched));

        if matched.target.starts_with("./") {
            return self.resolve_package_file(&desc.root, &matched.target, spec, spec, trace);
        }

        trace.success(steps::RESOLVE_HASH_IMPORT, format!("bare target {}", matched.target));
        self.resolve_bare(&matched.target, &desc.root, mode, trace)
    }
}

fn match_step(step: &'static str, matched: &TargetMatch) -> ResolveTraceStep {
    ResolveTraceStep::new(step, true, "matched")
        .with_key(&matched.key)
        .with_target(&matched.target)
        .with_condition(matched.condition.clone())
}

fn target_error(err: TargetError, key: &str, root: &Path) -> ResolveError {
    match err {
        TargetError::Invalid(target) => ResolveError::InvalidPackageTarget {
            key: key.to_string(),
            target,
            package_root: root.to_path_buf(),
        },
        TargetError::UnsupportedPattern(target) => ResolveError::UnsupportedPattern { target },
    }
}

/// `foo` + `.js` gives `foo.js`; `foo.bar` + `.js` gives `foo.bar.js`.
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(ext);
    PathBuf::from(name)
}
