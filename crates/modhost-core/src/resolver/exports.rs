//! Package.json `exports` / `imports` target evaluation.
//!
//! Implements Node.js-compatible target resolution over the raw JSON tree:
//! - String targets
//! - Array fallbacks (first success wins)
//! - Condition maps, tried in the caller's condition order
//! - Subpath keys with exact match first, then single `*` pattern keys

use crate::json::{JsonObject, JsonValue};

/// Which field a target came from. `imports` targets may name bare packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetField {
    Exports,
    Imports,
}

/// Failure while evaluating a target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// A leaf target is not a permitted form (e.g. missing `./`, contains `..`).
    Invalid(String),
    /// A matched target contains more than one `*`.
    UnsupportedPattern(String),
}

/// A resolved target string, plus the key that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatch {
    /// Target after pattern substitution.
    pub target: String,
    /// The `exports`/`imports` key that matched (`.` for root shorthands).
    pub key: String,
    /// Condition that selected the target, if any.
    pub condition: Option<String>,
}

/// Resolve `subpath` against an `exports`/`imports` tree.
///
/// Returns `Ok(None)` when nothing matches, so the caller can report
/// "not exported" / "not defined".
pub fn resolve_exports_target(
    node: &JsonValue,
    subpath: &str,
    conditions: &[&str],
    field: TargetField,
) -> Result<Option<TargetMatch>, TargetError> {
    match node {
        JsonValue::Object(obj) if has_subpath_keys(obj) => {
            resolve_subpath_map(obj, subpath, conditions, field)
        }
        _ => {
            // Root shorthand: string, array or condition map applies to "." only,
            // or to a subpath naming the string itself.
            let found = resolve_target_value(node, subpath, conditions, field)?;
            Ok(found.map(|(target, condition)| TargetMatch {
                target,
                key: ".".to_string(),
                condition,
            }))
        }
    }
}

/// Whether any key looks like a subpath (`.`, `/` or `#` prefix).
fn has_subpath_keys(obj: &JsonObject) -> bool {
    obj.keys()
        .any(|k| k.starts_with('.') || k.starts_with('/') || k.starts_with('#'))
}

fn resolve_subpath_map(
    obj: &JsonObject,
    subpath: &str,
    conditions: &[&str],
    field: TargetField,
) -> Result<Option<TargetMatch>, TargetError> {
    // Exact key first
    if let Some(value) = obj.get(subpath) {
        let found = resolve_target_value(value, ".", conditions, field)?;
        return Ok(found.map(|(target, condition)| TargetMatch {
            target,
            key: subpath.to_string(),
            condition,
        }));
    }

    // Pattern keys in document order, first match wins
    for (key, value) in obj.iter() {
        if key.matches('*').count() != 1 {
            continue;
        }
        let Some(capture) = match_pattern(key, subpath) else {
            continue;
        };

        let Some((target, condition)) = resolve_target_value(value, ".", conditions, field)?
        else {
            return Ok(None);
        };

        let target = substitute_star(&target, capture)?;
        if has_parent_segment(&target) {
            return Err(TargetError::Invalid(target));
        }

        return Ok(Some(TargetMatch {
            target,
            key: key.to_string(),
            condition,
        }));
    }

    Ok(None)
}

/// Resolve a target value (string, array or condition map).
fn resolve_target_value(
    value: &JsonValue,
    subpath: &str,
    conditions: &[&str],
    field: TargetField,
) -> Result<Option<(String, Option<String>)>, TargetError> {
    match value {
        JsonValue::String(s) => {
            if subpath != "." && subpath != s.as_str() {
                return Ok(None);
            }
            validate_target(s, field)?;
            Ok(Some((s.clone(), None)))
        }
        JsonValue::Array(items) => {
            let mut last_err = None;
            for item in items {
                match resolve_target_value(item, subpath, conditions, field) {
                    Ok(Some(found)) => return Ok(Some(found)),
                    Ok(None) => {}
                    Err(e) => last_err = Some(e),
                }
            }
            last_err.map_or(Ok(None), Err)
        }
        JsonValue::Object(obj) => {
            // Conditions tried in the caller's order; a failing condition falls through.
            let mut last_err = None;
            for condition in conditions {
                let Some(inner) = obj.get(condition) else {
                    continue;
                };
                match resolve_target_value(inner, subpath, conditions, field) {
                    Ok(Some((target, nested))) => {
                        return Ok(Some((target, nested.or_else(|| Some((*condition).to_string())))))
                    }
                    Ok(None) => {}
                    Err(e) => last_err = Some(e),
                }
            }
            last_err.map_or(Ok(None), Err)
        }
        // null explicitly blocks a subpath
        _ => Ok(None),
    }
}

/// Check a leaf target's form.
fn validate_target(target: &str, field: TargetField) -> Result<(), TargetError> {
    if target.starts_with("./") {
        if has_parent_segment(target) {
            return Err(TargetError::Invalid(target.to_string()));
        }
        return Ok(());
    }

    let bare_allowed = field == TargetField::Imports
        && !target.is_empty()
        && !target.starts_with('/')
        && !target.starts_with('.')
        && !target.contains("://");
    if bare_allowed {
        Ok(())
    } else {
        Err(TargetError::Invalid(target.to_string()))
    }
}

fn has_parent_segment(target: &str) -> bool {
    target.split('/').any(|segment| segment == "..")
}

/// Match a single-`*` pattern key against a subpath, returning the capture.
///
/// `"./features/*.js"` with `"./features/foo.js"` captures `"foo"`. Empty
/// captures do not match.
pub fn match_pattern<'a>(pattern: &str, subpath: &'a str) -> Option<&'a str> {
    let (prefix, suffix) = pattern.split_once('*')?;

    if !subpath.starts_with(prefix) || !subpath.ends_with(suffix) {
        return None;
    }

    let start = prefix.len();
    let end = subpath.len().checked_sub(suffix.len())?;
    if start >= end {
        return None;
    }

    Some(&subpath[start..end])
}

/// Splice a capture into a target's `*`.
fn substitute_star(target: &str, capture: &str) -> Result<String, TargetError> {
    match target.matches('*').count() {
        0 => Ok(target.to_string()),
        1 => Ok(target.replacen('*', capture, 1)),
        _ => Err(TargetError::UnsupportedPattern(target.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::parse;

    const IMPORT: &[&str] = &["import", "node", "default"];
    const REQUIRE: &[&str] = &["require", "node", "default"];

    fn exports_target(json: &str, subpath: &str, conditions: &[&str]) -> Option<String> {
        let value = parse(json).unwrap();
        resolve_exports_target(&value, subpath, conditions, TargetField::Exports)
            .unwrap()
            .map(|m| m.target)
    }

    #[test]
    fn test_string_shorthand() {
        assert_eq!(exports_target(r#""./index.js""#, ".", IMPORT), Some("./index.js".into()));
        assert_eq!(
            exports_target(r#""./index.js""#, "./index.js", IMPORT),
            Some("./index.js".into())
        );
        assert_eq!(exports_target(r#""./index.js""#, "./other", IMPORT), None);
    }

    #[test]
    fn test_conditional_exports_by_mode() {
        let json = r#"{".": {"import": "./esm.js", "require": "./cjs.js", "default": "./cjs.js"}}"#;
        assert_eq!(exports_target(json, ".", IMPORT), Some("./esm.js".into()));
        assert_eq!(exports_target(json, ".", REQUIRE), Some("./cjs.js".into()));
    }

    #[test]
    fn test_root_condition_map() {
        let json = r#"{"node": "./node.js", "default": "./browser.js"}"#;
        assert_eq!(exports_target(json, ".", IMPORT), Some("./node.js".into()));
        assert_eq!(exports_target(json, "./x", IMPORT), None);
    }

    #[test]
    fn test_conditions_follow_caller_order_not_document_order() {
        let json = r#"{".": {"default": "./d.js", "require": "./r.js"}}"#;
        assert_eq!(exports_target(json, ".", REQUIRE), Some("./r.js".into()));
        assert_eq!(exports_target(json, ".", IMPORT), Some("./d.js".into()));
    }

    #[test]
    fn test_failing_condition_falls_through() {
        let json = r#"{".": {"import": null, "default": "./d.js"}}"#;
        assert_eq!(exports_target(json, ".", IMPORT), Some("./d.js".into()));
    }

    #[test]
    fn test_nested_conditions() {
        let json = r#"{".": {"node": {"import": "./n.mjs", "require": "./n.cjs"}, "default": "./d.js"}}"#;
        assert_eq!(exports_target(json, ".", IMPORT), Some("./n.mjs".into()));
        assert_eq!(exports_target(json, ".", REQUIRE), Some("./n.cjs".into()));
    }

    #[test]
    fn test_array_first_success() {
        let json = r#"{".": [{"browser": "./b.js"}, "./fallback.js"]}"#;
        assert_eq!(exports_target(json, ".", IMPORT), Some("./fallback.js".into()));
    }

    #[test]
    fn test_pattern_exports() {
        let json = r#"{"./features/*.js": "./src/features/*.js"}"#;
        assert_eq!(
            exports_target(json, "./features/foo.js", IMPORT),
            Some("./src/features/foo.js".into())
        );
        assert_eq!(exports_target(json, "./features/.js", IMPORT), None);
        assert_eq!(exports_target(json, "./other/foo.js", IMPORT), None);
    }

    #[test]
    fn test_exact_key_beats_pattern() {
        let json = r#"{"./*": "./dist/*.js", "./special": "./special/index.js"}"#;
        assert_eq!(
            exports_target(json, "./special", IMPORT),
            Some("./special/index.js".into())
        );
        assert_eq!(exports_target(json, "./util", IMPORT), Some("./dist/util.js".into()));
    }

    #[test]
    fn test_pattern_first_match_in_document_order() {
        let json = r#"{"./*": "./a/*.js", "./lib/*": "./b/*.js"}"#;
        assert_eq!(exports_target(json, "./lib/x", IMPORT), Some("./a/lib/x.js".into()));
    }

    #[test]
    fn test_pattern_with_conditions() {
        let json = r#"{"./*": {"import": "./esm/*.mjs", "default": "./cjs/*.js"}}"#;
        assert_eq!(exports_target(json, "./x", IMPORT), Some("./esm/x.mjs".into()));
        assert_eq!(exports_target(json, "./x", REQUIRE), Some("./cjs/x.js".into()));
    }

    #[test]
    fn test_pattern_target_without_star() {
        let json = r#"{"./legacy/*": "./legacy.js"}"#;
        assert_eq!(exports_target(json, "./legacy/a", IMPORT), Some("./legacy.js".into()));
    }

    #[test]
    fn test_double_star_target_unsupported() {
        let value = parse(r#"{"./*": "./*/*.js"}"#).unwrap();
        let err = resolve_exports_target(&value, "./x", IMPORT, TargetField::Exports).unwrap_err();
        assert_eq!(err, TargetError::UnsupportedPattern("./*/*.js".into()));
    }

    #[test]
    fn test_double_star_key_skipped() {
        assert_eq!(exports_target(r#"{"./*/*": "./x/*.js"}"#, "./a/b", IMPORT), None);
    }

    #[test]
    fn test_invalid_exports_targets() {
        for json in [r#"{".": "index.js"}"#, r#"{".": "./../escape.js"}"#] {
            let value = parse(json).unwrap();
            let err = resolve_exports_target(&value, ".", IMPORT, TargetField::Exports);
            assert!(matches!(err, Err(TargetError::Invalid(_))), "{json}");
        }

        let value = parse(r#"{"./*": "./lib/*"}"#).unwrap();
        let err = resolve_exports_target(&value, "./../x", IMPORT, TargetField::Exports);
        assert!(matches!(err, Err(TargetError::Invalid(_))));
    }

    #[test]
    fn test_imports_allow_bare_targets() {
        let value = parse(r##"{"#dep": "some-pkg", "#internal/*": "./src/internal/*.js"}"##).unwrap();
        let found = resolve_exports_target(&value, "#dep", IMPORT, TargetField::Imports)
            .unwrap()
            .unwrap();
        assert_eq!(found.target, "some-pkg");
        assert_eq!(found.key, "#dep");

        let found = resolve_exports_target(&value, "#internal/a", REQUIRE, TargetField::Imports)
            .unwrap()
            .unwrap();
        assert_eq!(found.target, "./src/internal/a.js");
        assert_eq!(found.key, "#internal/*");
    }

    #[test]
    fn test_match_records_condition() {
        let value = parse(r#"{".": {"require": "./c.js"}}"#).unwrap();
        let found = resolve_exports_target(&value, ".", REQUIRE, TargetField::Exports)
            .unwrap()
            .unwrap();
        assert_eq!(found.condition.as_deref(), Some("require"));
    }

    #[test]
    fn test_match_pattern() {
        assert_eq!(match_pattern("./features/*", "./features/foo"), Some("foo"));
        assert_eq!(match_pattern("./*.js", "./a/b.js"), Some("a/b"));
        assert_eq!(match_pattern("./features/*", "./features/"), None);
        assert_eq!(match_pattern("./a*a", "./a"), None);
    }
}
