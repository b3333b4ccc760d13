//! Scripted engine for tests.
//!
//! "Compiling" a CommonJS wrapper looks up a Rust closure registered for the
//! filename; calling the resulting function runs that closure with the
//! module arguments. `JSON.parse(...)` scripts are decoded with `serde_json`.

use crate::engine::{Engine, NativeFunction};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

type NativeBody = Rc<dyn Fn(&MockEngine, &[MockValue]) -> MockValue>;
type ModuleBody = Rc<dyn Fn(&MockEngine, &ModuleArgs) -> Result<(), String>>;

#[derive(Clone)]
pub(crate) enum MockValue {
    Undefined,
    Bool(bool),
    Num(f64),
    Str(String),
    Object(Rc<ObjectCell>),
}

pub(crate) struct ObjectCell {
    props: RefCell<BTreeMap<String, MockValue>>,
    callable: Option<Callable>,
}

enum Callable {
    Native(NativeBody),
    Module(ModuleBody),
}

impl MockValue {
    fn object(callable: Option<Callable>) -> Self {
        Self::Object(Rc::new(ObjectCell {
            props: RefCell::new(BTreeMap::new()),
            callable,
        }))
    }

    /// Reference identity for objects, value equality otherwise.
    pub(crate) fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Undefined, Self::Undefined) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Num(a), Self::Num(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    fn pin_key(&self) -> Option<usize> {
        match self {
            Self::Object(cell) => Some(Rc::as_ptr(cell) as usize),
            _ => None,
        }
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Undefined,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => {
                let array = Self::object(None);
                if let Self::Object(cell) = &array {
                    let mut props = cell.props.borrow_mut();
                    for (i, item) in items.iter().enumerate() {
                        props.insert(i.to_string(), Self::from_json(item));
                    }
                    props.insert("length".to_string(), Self::Num(items.len() as f64));
                }
                array
            }
            serde_json::Value::Object(map) => {
                let object = Self::object(None);
                if let Self::Object(cell) = &object {
                    let mut props = cell.props.borrow_mut();
                    for (key, item) in map {
                        props.insert(key.clone(), Self::from_json(item));
                    }
                }
                object
            }
        }
    }
}

impl fmt::Debug for MockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Object(cell) => f.debug_map().entries(cell.props.borrow().iter()).finish(),
        }
    }
}

/// Arguments a module body receives.
pub(crate) struct ModuleArgs {
    pub exports: MockValue,
    pub require: MockValue,
    pub module: MockValue,
    pub filename: MockValue,
    pub dirname: MockValue,
}

impl ModuleArgs {
    fn from_slice(args: &[MockValue]) -> Self {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(MockValue::Undefined);
        Self {
            exports: arg(0),
            require: arg(1),
            module: arg(2),
            filename: arg(3),
            dirname: arg(4),
        }
    }
}

pub(crate) struct MockEngine {
    modules: RefCell<HashMap<String, ModuleBody>>,
    exception: RefCell<Option<String>>,
    compiled: RefCell<Vec<(String, String)>>,
    evaluated_modules: RefCell<Vec<String>>,
    pins: RefCell<HashMap<usize, i64>>,
    global: MockValue,
    native_esm: bool,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self {
            modules: RefCell::new(HashMap::new()),
            exception: RefCell::new(None),
            compiled: RefCell::new(Vec::new()),
            evaluated_modules: RefCell::new(Vec::new()),
            pins: RefCell::new(HashMap::new()),
            global: MockValue::object(None),
            native_esm: false,
        }
    }

    pub(crate) fn with_native_esm() -> Self {
        Self {
            native_esm: true,
            ..Self::new()
        }
    }

    /// Register the body run when the module at `filename` is evaluated.
    pub(crate) fn register(
        &self,
        filename: &str,
        body: impl Fn(&MockEngine, &ModuleArgs) -> Result<(), String> + 'static,
    ) {
        self.modules
            .borrow_mut()
            .insert(filename.to_string(), Rc::new(body));
    }

    /// Call a `require` function from inside a module body.
    pub(crate) fn require(&self, require: &MockValue, specifier: &str) -> Result<MockValue, String> {
        let arg = self.new_string(specifier);
        self.call(require, &MockValue::Undefined, &[arg])
            .ok_or_else(|| format!("require('{specifier}') threw"))
    }

    pub(crate) fn get(&self, object: &MockValue, name: &str) -> MockValue {
        self.get_property(object, name)
    }

    pub(crate) fn set(&self, object: &MockValue, name: &str, value: MockValue) {
        self.set_property(object, name, value);
    }

    pub(crate) fn take_exception(&self) -> Option<String> {
        self.exception.borrow_mut().take()
    }

    /// `(filename, code)` of every script compiled so far.
    pub(crate) fn compiled(&self) -> Vec<(String, String)> {
        self.compiled.borrow().clone()
    }

    pub(crate) fn evaluated_modules(&self) -> Vec<String> {
        self.evaluated_modules.borrow().clone()
    }

    /// Values still pinned with `protect`.
    pub(crate) fn pinned_count(&self) -> i64 {
        self.pins.borrow().values().sum()
    }

    fn compile_json(&self, code: &str) -> Option<MockValue> {
        let literal = code.strip_prefix("JSON.parse(")?.strip_suffix(')')?;
        let text: String = serde_json::from_str(literal).ok()?;
        let value: serde_json::Value = serde_json::from_str(&text).ok()?;
        Some(MockValue::from_json(&value))
    }
}

impl Engine for MockEngine {
    type Value = MockValue;

    fn new_object(&self) -> MockValue {
        MockValue::object(None)
    }

    fn new_string(&self, s: &str) -> MockValue {
        MockValue::Str(s.to_string())
    }

    fn new_bool(&self, b: bool) -> MockValue {
        MockValue::Bool(b)
    }

    fn new_undefined(&self) -> MockValue {
        MockValue::Undefined
    }

    fn new_function(&self, name: &str, f: NativeFunction<Self>) -> MockValue {
        let function = MockValue::object(Some(Callable::Native(Rc::from(f))));
        self.set_property(&function, "name", MockValue::Str(name.to_string()));
        function
    }

    fn global_object(&self) -> MockValue {
        self.global.clone()
    }

    fn get_property(&self, object: &MockValue, name: &str) -> MockValue {
        match object {
            MockValue::Object(cell) => cell
                .props
                .borrow()
                .get(name)
                .cloned()
                .unwrap_or(MockValue::Undefined),
            _ => MockValue::Undefined,
        }
    }

    fn set_property(&self, object: &MockValue, name: &str, value: MockValue) {
        if let MockValue::Object(cell) = object {
            cell.props.borrow_mut().insert(name.to_string(), value);
        }
    }

    fn value_to_string(&self, value: &MockValue) -> Option<String> {
        value.as_str().map(str::to_string)
    }

    fn call(&self, function: &MockValue, _this: &MockValue, args: &[MockValue]) -> Option<MockValue> {
        let MockValue::Object(cell) = function else {
            self.throw_exception("TypeError: not a function");
            return None;
        };

        match &cell.callable {
            Some(Callable::Native(f)) => {
                let f = Rc::clone(f);
                let result = f(self, args);
                if self.exception.borrow().is_some() {
                    None
                } else {
                    Some(result)
                }
            }
            Some(Callable::Module(body)) => {
                let body = Rc::clone(body);
                match body(self, &ModuleArgs::from_slice(args)) {
                    Ok(()) => Some(MockValue::Undefined),
                    Err(message) => {
                        let mut exception = self.exception.borrow_mut();
                        if exception.is_none() {
                            *exception = Some(message);
                        }
                        None
                    }
                }
            }
            None => {
                self.throw_exception("TypeError: not a function");
                None
            }
        }
    }

    fn eval(&self, code: &str, filename: &str) -> bool {
        self.eval_script_with_result(code, filename).is_some()
    }

    fn eval_script_with_result(&self, code: &str, filename: &str) -> Option<MockValue> {
        self.compiled
            .borrow_mut()
            .push((filename.to_string(), code.to_string()));

        if code.starts_with("(function (exports") {
            let body = self.modules.borrow().get(filename).cloned();
            return match body {
                Some(body) => Some(MockValue::object(Some(Callable::Module(body)))),
                None => {
                    self.throw_exception(&format!("SyntaxError: no body registered for {filename}"));
                    None
                }
            };
        }

        if code.starts_with("JSON.parse(") {
            let value = self.compile_json(code);
            if value.is_none() {
                self.throw_exception(&format!("SyntaxError: invalid JSON in {filename}"));
            }
            return value;
        }

        self.throw_exception(&format!("SyntaxError: unsupported script {filename}"));
        None
    }

    fn protect(&self, value: &MockValue) {
        if let Some(key) = value.pin_key() {
            *self.pins.borrow_mut().entry(key).or_insert(0) += 1;
        }
    }

    fn unprotect(&self, value: &MockValue) {
        if let Some(key) = value.pin_key() {
            *self.pins.borrow_mut().entry(key).or_insert(0) -= 1;
        }
    }

    fn throw_exception(&self, message: &str) {
        *self.exception.borrow_mut() = Some(message.to_string());
    }

    fn supports_native_esm(&self) -> bool {
        self.native_esm
    }

    fn eval_module(&self, _code: &str, filename: &str) -> bool {
        if !self.native_esm {
            return false;
        }
        self.evaluated_modules.borrow_mut().push(filename.to_string());
        true
    }
}
