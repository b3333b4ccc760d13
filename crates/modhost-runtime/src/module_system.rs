//! Module loading on top of the resolver and a script engine.
//!
//! `ModuleSystem` owns the exports cache and the set of modules currently
//! being evaluated. A module is marked as loading before its body runs, and
//! [`LoadingGuard`] clears the mark on every exit path, so a circular
//! `require` sees the partial exports and a module that threw can be
//! required again.

use crate::cjs::{esm_bridge_source, json_module_source, wrap_commonjs, REQUIRE_GLOBAL};
use crate::engine::{Engine, NativeFunction, NoTypeScript, TypeScriptTranspiler};
use crate::error::ModuleError;
use crate::transpile::esm_to_cjs;
use log::{debug, error, trace};
use modhost_core::resolver::SpecifierKind;
use modhost_core::{is_typescript_path, ModuleFormat, ModuleResolver, ResolveMode, ResolvedModule};
use modhost_util::path::display_slash;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

struct ModuleState<V> {
    /// Resolved path to its final `module.exports`.
    cache: HashMap<PathBuf, V>,
    /// Resolved path to the `module` object of a module still being evaluated.
    loading: HashMap<PathBuf, V>,
    /// Paths in the order their evaluation completed.
    loaded: Vec<PathBuf>,
}

impl<V> ModuleState<V> {
    fn new() -> Self {
        Self {
            cache: HashMap::new(),
            loading: HashMap::new(),
            loaded: Vec::new(),
        }
    }
}

/// Loads CommonJS, JSON and (transpiled or native) ES modules into an engine.
///
/// Each engine instance owns its own `ModuleSystem`; nothing is shared
/// between instances.
pub struct ModuleSystem<E: Engine + 'static> {
    engine: Rc<E>,
    resolver: ModuleResolver,
    typescript: Box<dyn TypeScriptTranspiler>,
    state: RefCell<ModuleState<E::Value>>,
    weak_self: Weak<Self>,
}

/// Removes a path from the loading set when evaluation ends, however it ends.
struct LoadingGuard<'a, E: Engine + 'static> {
    system: &'a ModuleSystem<E>,
    path: PathBuf,
}

impl<E: Engine + 'static> Drop for LoadingGuard<'_, E> {
    fn drop(&mut self) {
        let module = self.system.state.borrow_mut().loading.remove(&self.path);
        if let Some(module) = module {
            self.system.engine.unprotect(&module);
        }
    }
}

impl<E: Engine + 'static> ModuleSystem<E> {
    /// Create a module system without TypeScript support.
    pub fn new(engine: Rc<E>, resolver: ModuleResolver) -> Rc<Self> {
        Self::with_typescript(engine, resolver, Box::new(NoTypeScript))
    }

    pub fn with_typescript(
        engine: Rc<E>,
        resolver: ModuleResolver,
        typescript: Box<dyn TypeScriptTranspiler>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            engine,
            resolver,
            typescript,
            state: RefCell::new(ModuleState::new()),
            weak_self: weak_self.clone(),
        })
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Load the program entry point.
    ///
    /// A bare argument such as `main.js` is treated as `./main.js`. On an
    /// engine with native ESM an ES module entry is handed to
    /// [`Engine::eval_module`] and `None` is returned; otherwise the entry's
    /// exports are returned.
    pub fn load_entry(&self, entry: &str) -> Result<Option<E::Value>, ModuleError> {
        let specifier = entry_specifier(entry);
        let resolved = self.resolver.resolve(&specifier, None, ResolveMode::Require)?;
        debug!(
            "entry '{entry}' resolved to '{}' ({})",
            display_slash(&resolved.path),
            resolved.format
        );

        if resolved.format == ModuleFormat::Esm && self.engine.supports_native_esm() {
            let source = self.read_source(&resolved.path)?;
            if !self.engine.eval_module(&source, &display_slash(&resolved.path)) {
                return Err(ModuleError::EntryFailed {
                    path: resolved.path,
                });
            }
            self.state.borrow_mut().loaded.push(resolved.path);
            return Ok(None);
        }

        self.load_resolved(&resolved).map(Some)
    }

    /// `require(specifier)` as seen from `referrer`.
    pub fn require(&self, specifier: &str, referrer: Option<&Path>) -> Result<E::Value, ModuleError> {
        self.require_with_mode(specifier, referrer, ResolveMode::Require)
    }

    fn require_with_mode(
        &self,
        specifier: &str,
        referrer: Option<&Path>,
        mode: ResolveMode,
    ) -> Result<E::Value, ModuleError> {
        let resolved = self.resolver.resolve(specifier, referrer, mode)?;
        trace!(
            "require '{specifier}' ({mode}) -> '{}'",
            display_slash(&resolved.path)
        );
        self.load_resolved(&resolved)
    }

    /// Resolve an `import` for an engine's native module hooks.
    pub fn resolve_import(
        &self,
        specifier: &str,
        referrer: &Path,
    ) -> Result<ResolvedModule, ModuleError> {
        Ok(self
            .resolver
            .resolve(specifier, Some(referrer), ResolveMode::Import)?)
    }

    /// ES module source for a resolved path, for engines that evaluate ESM.
    ///
    /// CommonJS and JSON targets get a shim that loads them through the
    /// global installed by [`install_globals`](Self::install_globals).
    pub fn load_esm_source(&self, path: &Path) -> Result<String, ModuleError> {
        match self.resolver.detect_format(path) {
            ModuleFormat::Esm => self.read_source(path),
            ModuleFormat::Cjs => {
                let source = self.read_source(path)?;
                Ok(esm_bridge_source(path, &source))
            }
            ModuleFormat::Json => Ok(esm_bridge_source(path, "")),
        }
    }

    /// Install the global function ESM shims use to load CommonJS by path.
    pub fn install_globals(&self) {
        let system = self.weak_self.clone();
        let load: NativeFunction<E> = Box::new(move |engine, args| {
            let Some(system) = system.upgrade() else {
                engine.throw_exception("module system is no longer available");
                return engine.new_undefined();
            };
            let Some(path) = args.first().and_then(|v| engine.value_to_string(v)) else {
                engine.throw_exception(&format!("{REQUIRE_GLOBAL}() expects a module path"));
                return engine.new_undefined();
            };

            let path = PathBuf::from(path);
            let resolved = ResolvedModule {
                format: system.resolver.detect_format(&path),
                storage: system.resolver.storage(),
                path,
            };
            match system.load_resolved(&resolved) {
                Ok(exports) => exports,
                Err(err) => throw_module_error(engine, &resolved.path, &err),
            }
        });

        let function = self.engine.new_function(REQUIRE_GLOBAL, load);
        let global = self.engine.global_object();
        self.engine.set_property(&global, REQUIRE_GLOBAL, function);
    }

    /// Paths whose evaluation has completed, in completion order.
    #[must_use]
    pub fn loaded_modules(&self) -> Vec<PathBuf> {
        self.state.borrow().loaded.clone()
    }

    #[must_use]
    pub fn is_cached(&self, path: &Path) -> bool {
        self.state.borrow().cache.contains_key(path)
    }

    #[must_use]
    pub fn is_loading(&self, path: &Path) -> bool {
        self.state.borrow().loading.contains_key(path)
    }

    fn load_resolved(&self, resolved: &ResolvedModule) -> Result<E::Value, ModuleError> {
        let path = resolved.path.as_path();

        let cached = self.state.borrow().cache.get(path).cloned();
        if let Some(exports) = cached {
            return Ok(exports);
        }

        let in_progress = self.state.borrow().loading.get(path).cloned();
        if let Some(module) = in_progress {
            debug!(
                "circular require of '{}', returning partial exports",
                display_slash(path)
            );
            return Ok(self.engine.get_property(&module, "exports"));
        }

        match resolved.format {
            ModuleFormat::Json => self.execute_json_module(path),
            ModuleFormat::Cjs => {
                let source = self.read_source(path)?;
                self.execute_cjs_module(path, &source, ResolveMode::Require)
            }
            ModuleFormat::Esm => {
                if self.engine.supports_native_esm() {
                    return Err(ModuleError::RequireEsm {
                        path: path.to_path_buf(),
                    });
                }
                let source = self.read_source(path)?;
                // Its imports keep ESM semantics: resolve with import conditions.
                self.execute_cjs_module(path, &esm_to_cjs(&source), ResolveMode::Import)
            }
        }
    }

    /// Read a module's source, transpiling TypeScript first.
    fn read_source(&self, path: &Path) -> Result<String, ModuleError> {
        let bytes = self
            .resolver
            .source()
            .read_file(path)
            .map_err(|source| ModuleError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        if !is_typescript_path(path) {
            return Ok(text);
        }
        if !self.typescript.is_available() {
            return Err(ModuleError::TypeScriptUnavailable {
                path: path.to_path_buf(),
            });
        }
        self.typescript
            .transpile(&text, &display_slash(path))
            .map_err(|message| ModuleError::TypeScript {
                path: path.to_path_buf(),
                message,
            })
    }

    fn execute_json_module(&self, path: &Path) -> Result<E::Value, ModuleError> {
        let text = self.read_source(path)?;
        let value = self
            .engine
            .eval_script_with_result(&json_module_source(&text), &display_slash(path))
            .ok_or_else(|| ModuleError::Compile {
                path: path.to_path_buf(),
            })?;
        self.cache_exports(path, value.clone());
        Ok(value)
    }

    fn execute_cjs_module(
        &self,
        path: &Path,
        source: &str,
        mode: ResolveMode,
    ) -> Result<E::Value, ModuleError> {
        let engine = &*self.engine;
        let filename = display_slash(path);
        let dirname = path.parent().map(display_slash).unwrap_or_default();

        let exports = engine.new_object();
        let module = engine.new_object();
        engine.set_property(&module, "exports", exports.clone());
        engine.set_property(&module, "id", engine.new_string(&filename));
        engine.set_property(&module, "filename", engine.new_string(&filename));
        engine.set_property(&module, "loaded", engine.new_bool(false));

        engine.protect(&module);
        self.state
            .borrow_mut()
            .loading
            .insert(path.to_path_buf(), module.clone());
        let _guard = LoadingGuard {
            system: self,
            path: path.to_path_buf(),
        };

        let require = self.make_require(path, mode);
        let wrapper = engine
            .eval_script_with_result(&wrap_commonjs(source), &filename)
            .ok_or_else(|| ModuleError::Compile {
                path: path.to_path_buf(),
            })?;

        let args = [
            exports.clone(),
            require,
            module.clone(),
            engine.new_string(&filename),
            engine.new_string(&dirname),
        ];
        engine.protect(&wrapper);
        let completed = engine.call(&wrapper, &exports, &args);
        engine.unprotect(&wrapper);
        if completed.is_none() {
            return Err(ModuleError::Exception {
                path: path.to_path_buf(),
            });
        }

        let exports = engine.get_property(&module, "exports");
        engine.set_property(&module, "loaded", engine.new_bool(true));
        self.cache_exports(path, exports.clone());
        debug!("loaded '{filename}'");
        Ok(exports)
    }

    fn cache_exports(&self, path: &Path, exports: E::Value) {
        self.engine.protect(&exports);
        let previous = {
            let mut state = self.state.borrow_mut();
            state.loaded.push(path.to_path_buf());
            state.cache.insert(path.to_path_buf(), exports)
        };
        if let Some(previous) = previous {
            self.engine.unprotect(&previous);
        }
    }

    /// Build the `require` function bound into the module at `referrer`.
    fn make_require(&self, referrer: &Path, mode: ResolveMode) -> E::Value {
        let system = self.weak_self.clone();
        let from = referrer.to_path_buf();
        let require: NativeFunction<E> = Box::new(move |engine, args| {
            let Some(system) = system.upgrade() else {
                engine.throw_exception("module system is no longer available");
                return engine.new_undefined();
            };
            let Some(specifier) = args.first().and_then(|v| engine.value_to_string(v)) else {
                engine.throw_exception("require() expects a string specifier");
                return engine.new_undefined();
            };
            match system.require_with_mode(&specifier, Some(&from), mode) {
                Ok(exports) => exports,
                Err(err) => throw_module_error(engine, &from, &err),
            }
        });

        let system = self.weak_self.clone();
        let from = referrer.to_path_buf();
        let resolve: NativeFunction<E> = Box::new(move |engine, args| {
            let Some(system) = system.upgrade() else {
                engine.throw_exception("module system is no longer available");
                return engine.new_undefined();
            };
            let Some(specifier) = args.first().and_then(|v| engine.value_to_string(v)) else {
                engine.throw_exception("require.resolve() expects a string specifier");
                return engine.new_undefined();
            };
            match system.resolver.resolve(&specifier, Some(&from), mode) {
                Ok(resolved) => engine.new_string(&display_slash(&resolved.path)),
                Err(err) => throw_module_error(engine, &from, &ModuleError::from(err)),
            }
        });

        let require_fn = self.engine.new_function("require", require);
        let resolve_fn = self.engine.new_function("resolve", resolve);
        self.engine.set_property(&require_fn, "resolve", resolve_fn);
        require_fn
    }
}

impl<E: Engine + 'static> Drop for ModuleSystem<E> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (_, value) in state.cache.drain().chain(state.loading.drain()) {
            self.engine.unprotect(&value);
        }
    }
}

/// Log a failed load and surface it to the running script.
fn throw_module_error<E: Engine>(engine: &E, referrer: &Path, err: &ModuleError) -> E::Value {
    error!("[{}] in '{}': {err}", err.code(), display_slash(referrer));
    if !err.is_pending_exception() {
        engine.throw_exception(&err.to_string());
    }
    engine.new_undefined()
}

/// Treat a bare entry argument (`main.js`) as relative to the root.
fn entry_specifier(entry: &str) -> String {
    match SpecifierKind::of(entry) {
        SpecifierKind::Bare => format!("./{entry}"),
        _ => entry.to_string(),
    }
}
