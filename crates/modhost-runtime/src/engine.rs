//! Collaborator interfaces: the hosting script engine and an optional
//! TypeScript transpiler.

/// A host function callable from script.
///
/// It receives the engine and the call arguments. Failure is signalled with
/// [`Engine::throw_exception`] followed by returning `undefined`.
pub type NativeFunction<E> = Box<dyn Fn(&E, &[<E as Engine>::Value]) -> <E as Engine>::Value>;

/// The script engine the module system drives.
///
/// All methods take `&self`: a script's `require()` re-enters the engine
/// while it is already running a call.
pub trait Engine {
    /// A handle to a script value.
    type Value: Clone;

    fn new_object(&self) -> Self::Value;

    fn new_string(&self, s: &str) -> Self::Value;

    fn new_bool(&self, b: bool) -> Self::Value;

    fn new_undefined(&self) -> Self::Value;

    fn new_function(&self, name: &str, f: NativeFunction<Self>) -> Self::Value
    where
        Self: Sized;

    /// The global object (`globalThis`).
    fn global_object(&self) -> Self::Value;

    fn get_property(&self, object: &Self::Value, name: &str) -> Self::Value;

    fn set_property(&self, object: &Self::Value, name: &str, value: Self::Value);

    /// String contents of a string value.
    fn value_to_string(&self, value: &Self::Value) -> Option<String>;

    /// Call `function` with `this_arg`. `None` means an exception is pending.
    fn call(
        &self,
        function: &Self::Value,
        this_arg: &Self::Value,
        args: &[Self::Value],
    ) -> Option<Self::Value>;

    /// Evaluate a script for its side effects.
    fn eval(&self, code: &str, filename: &str) -> bool;

    /// Evaluate a script and return its completion value. `None` means an
    /// exception (including a syntax error) is pending.
    fn eval_script_with_result(&self, code: &str, filename: &str) -> Option<Self::Value>;

    /// Pin a value against collection while native code holds it.
    fn protect(&self, value: &Self::Value);

    fn unprotect(&self, value: &Self::Value);

    /// Raise an exception in the running script.
    fn throw_exception(&self, message: &str);

    /// Whether this engine evaluates ES modules itself.
    fn supports_native_esm(&self) -> bool {
        false
    }

    /// Evaluate an ES module. Engines without native ESM return `false`.
    fn eval_module(&self, _code: &str, _filename: &str) -> bool {
        false
    }
}

/// External TypeScript-to-JavaScript transpiler.
pub trait TypeScriptTranspiler {
    fn is_available(&self) -> bool;

    /// Strip types from `source`. The error is a human-readable message.
    fn transpile(&self, source: &str, filename: &str) -> Result<String, String>;
}

/// Transpiler used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTypeScript;

impl TypeScriptTranspiler for NoTypeScript {
    fn is_available(&self) -> bool {
        false
    }

    fn transpile(&self, _source: &str, filename: &str) -> Result<String, String> {
        Err(format!("no TypeScript transpiler available for {filename}"))
    }
}
