//! CommonJS source generation: the module wrapper, JSON modules, and the
//! ESM shim that re-exports a CommonJS module to a native-ESM engine.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

/// Global the ESM shim calls to load a CommonJS module by resolved path.
pub const REQUIRE_GLOBAL: &str = "__modhost_require";

/// Parameter list of the CommonJS function wrapper.
pub const WRAPPER_PARAMS: &str = "exports, require, module, __filename, __dirname";

lazy_static! {
    static ref DEFINE_PROPERTY_RE: Regex =
        Regex::new(r#"Object\.defineProperty\s*\(\s*(?:module\.)?exports\s*,\s*["']([\w$]+)["']"#)
            .unwrap_or_else(|e| panic!("BUG: invalid defineProperty regex: {e}"));
    static ref EXPORTS_DOT_RE: Regex =
        Regex::new(r"(?:^|[^\w$.])(?:module\.)?exports\.([\w$]+)\s*=[^=]")
            .unwrap_or_else(|e| panic!("BUG: invalid exports regex: {e}"));
    static ref MODULE_EXPORTS_OBJECT_RE: Regex = Regex::new(r"module\.exports\s*=\s*\{([^}]*)\}")
        .unwrap_or_else(|e| panic!("BUG: invalid module.exports regex: {e}"));
    static ref OBJECT_KEY_RE: Regex = Regex::new(r"^\s*([A-Za-z_$][\w$]*)\s*(?::|\(|$)")
        .unwrap_or_else(|e| panic!("BUG: invalid object key regex: {e}"));
}

/// JavaScript reserved words that cannot be used as `export const` names.
const RESERVED_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "continue", "debugger", "default", "delete", "do", "else", "export",
    "extends", "finally", "for", "function", "if", "import", "in", "instanceof", "new", "return",
    "super", "switch", "this", "throw", "try", "typeof", "var", "void", "while", "with", "yield",
    "class", "const", "enum", "let", "static", "implements", "interface", "package", "private",
    "protected", "public", "await", "null", "true", "false", "undefined", "__esModule",
];

/// Quote a string as a JavaScript string literal.
#[must_use]
pub fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Wrap CommonJS source in a function expression taking the module arguments.
///
/// The body starts on the wrapper's first line so line numbers are unchanged.
#[must_use]
pub fn wrap_commonjs(source: &str) -> String {
    format!("(function ({WRAPPER_PARAMS}) {{ {source}\n}})")
}

/// Script that evaluates to the parsed value of a JSON module.
#[must_use]
pub fn json_module_source(text: &str) -> String {
    format!("JSON.parse({})", js_string(text))
}

/// ES module source that loads a CommonJS module through [`REQUIRE_GLOBAL`],
/// exports it as `default`, and re-exports statically visible names.
#[must_use]
pub fn esm_bridge_source(path: &Path, cjs_source: &str) -> String {
    let path_literal = js_string(&modhost_util::path::display_slash(path));
    let mut out = format!(
        "const __modhost_cjs = globalThis.{REQUIRE_GLOBAL}({path_literal});\nexport default __modhost_cjs;\n"
    );
    out.push_str(&generate_export_declarations(&scan_cjs_exports(cjs_source)));
    out
}

/// Scan CommonJS source for names assigned onto `exports`.
///
/// Recognizes `exports.x =`, `module.exports.x =`,
/// `Object.defineProperty(exports, "x", ...)` and `module.exports = { a, b: ... }`.
/// The result is sorted and deduplicated.
#[must_use]
pub fn scan_cjs_exports(source: &str) -> Vec<String> {
    let mut names = BTreeSet::new();

    for cap in DEFINE_PROPERTY_RE.captures_iter(source) {
        names.insert(cap[1].to_string());
    }

    for cap in EXPORTS_DOT_RE.captures_iter(source) {
        names.insert(cap[1].to_string());
    }

    for cap in MODULE_EXPORTS_OBJECT_RE.captures_iter(source) {
        for part in cap[1].split(',') {
            if let Some(key) = OBJECT_KEY_RE.captures(part) {
                names.insert(key[1].to_string());
            }
        }
    }

    names.into_iter().collect()
}

/// `export const` lines for scanned names, skipping reserved words.
#[must_use]
pub fn generate_export_declarations(names: &[String]) -> String {
    let mut declarations = String::new();
    for name in names {
        if RESERVED_KEYWORDS.contains(&name.as_str()) {
            continue;
        }
        declarations.push_str(&format!("export const {name} = __modhost_cjs.{name};\n"));
    }
    declarations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_commonjs_keeps_first_line() {
        let wrapped = wrap_commonjs("module.exports = 1;\nthrow new Error('line 2');");
        let mut lines = wrapped.lines();
        assert_eq!(
            lines.next(),
            Some("(function (exports, require, module, __filename, __dirname) { module.exports = 1;")
        );
        assert_eq!(lines.next(), Some("throw new Error('line 2');"));
        assert_eq!(lines.next(), Some("})"));
    }

    #[test]
    fn test_json_module_source_escapes() {
        let src = json_module_source("{\"a\": \"x\\ny\"}\n");
        assert_eq!(src, r#"JSON.parse("{\"a\": \"x\\ny\"}\n")"#);
    }

    #[test]
    fn test_scan_cjs_exports() {
        let source = r#"
            exports.alpha = 1;
            module.exports.beta = function () {};
            Object.defineProperty(exports, "gamma", { get() { return 3; } });
            if (exports.alpha === 1) {}
            module.exports = { delta, epsilon: 5, zeta() {} };
        "#;
        assert_eq!(
            scan_cjs_exports(source),
            vec!["alpha", "beta", "delta", "epsilon", "gamma", "zeta"]
        );
    }

    #[test]
    fn test_scan_ignores_comparisons() {
        assert!(scan_cjs_exports("if (exports.x == 1) {}").is_empty());
    }

    #[test]
    fn test_export_declarations_skip_reserved() {
        let names = vec!["default".to_string(), "ok".to_string(), "__esModule".to_string()];
        assert_eq!(
            generate_export_declarations(&names),
            "export const ok = __modhost_cjs.ok;\n"
        );
    }

    #[test]
    fn test_esm_bridge_source() {
        let shim = esm_bridge_source(Path::new("/app/lib.cjs"), "exports.run = () => {};");
        assert!(shim.starts_with(
            "const __modhost_cjs = globalThis.__modhost_require(\"/app/lib.cjs\");\n"
        ));
        assert!(shim.contains("export default __modhost_cjs;\n"));
        assert!(shim.ends_with("export const run = __modhost_cjs.run;\n"));
    }
}
