//! Line-oriented ESM to CommonJS rewriting.
//!
//! This is pattern matching over single statements, not a parser. Recognized
//! `import`/`export` lines are rewritten in place; every other line passes
//! through untouched. The output has the same number of lines as the input:
//! export bindings are installed as getters on the first line (after a
//! leading `"use strict"` prologue, if any), and an `import {`/`export {`
//! list spanning several lines is joined onto its first line with the
//! consumed lines left blank.

use crate::cjs::js_string;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SIDE_EFFECT_IMPORT_RE: Regex =
        Regex::new(r#"^import\s*["']([^"']+)["']\s*;?\s*(?://.*)?$"#)
            .unwrap_or_else(|e| panic!("BUG: invalid side-effect import regex: {e}"));
    static ref IMPORT_FROM_RE: Regex =
        Regex::new(r#"^import\s+(.+?)\s*from\s*["']([^"']+)["']\s*;?\s*(?://.*)?$"#)
            .unwrap_or_else(|e| panic!("BUG: invalid import regex: {e}"));
    static ref EXPORT_STAR_AS_RE: Regex = Regex::new(
        r#"^export\s*\*\s*as\s+([A-Za-z_$][\w$]*)\s+from\s*["']([^"']+)["']\s*;?\s*(?://.*)?$"#
    )
    .unwrap_or_else(|e| panic!("BUG: invalid export-star-as regex: {e}"));
    static ref EXPORT_STAR_RE: Regex =
        Regex::new(r#"^export\s*\*\s*from\s*["']([^"']+)["']\s*;?\s*(?://.*)?$"#)
            .unwrap_or_else(|e| panic!("BUG: invalid export-star regex: {e}"));
    static ref EXPORT_LIST_FROM_RE: Regex =
        Regex::new(r#"^export\s*\{([^}]*)\}\s*from\s*["']([^"']+)["']\s*;?\s*(?://.*)?$"#)
            .unwrap_or_else(|e| panic!("BUG: invalid export-from regex: {e}"));
    static ref EXPORT_LIST_RE: Regex = Regex::new(r"^export\s*\{([^}]*)\}\s*;?\s*(?://.*)?$")
        .unwrap_or_else(|e| panic!("BUG: invalid export list regex: {e}"));
    static ref EXPORT_DEFAULT_FUNCTION_RE: Regex = Regex::new(
        r"^export\s+default\s+((?:async\s+)?function\b\s*\*?\s*([A-Za-z_$][\w$]*)?)"
    )
    .unwrap_or_else(|e| panic!("BUG: invalid default function regex: {e}"));
    static ref EXPORT_DEFAULT_CLASS_RE: Regex =
        Regex::new(r"^export\s+default\s+(class\b(?:\s+([A-Za-z_$][\w$]*))?)")
            .unwrap_or_else(|e| panic!("BUG: invalid default class regex: {e}"));
    static ref EXPORT_DEFAULT_RE: Regex = Regex::new(r"^export\s+default\s+")
        .unwrap_or_else(|e| panic!("BUG: invalid default regex: {e}"));
    static ref EXPORT_DECL_RE: Regex = Regex::new(
        r"^export\s+(?:(?:async\s+)?function\b\s*\*?\s*([A-Za-z_$][\w$]*)|class\s+([A-Za-z_$][\w$]*)|(?:const|let|var)\s+)"
    )
    .unwrap_or_else(|e| panic!("BUG: invalid export declaration regex: {e}"));
    static ref DIRECTIVE_RE: Regex =
        Regex::new(r#"^\s*(?:"[^"\\]*"|'[^'\\]*')\s*;?\s*$"#)
            .unwrap_or_else(|e| panic!("BUG: invalid directive regex: {e}"));
    static ref BRACE_STATEMENT_RE: Regex =
        Regex::new(r"^(?:import\s+(?:[A-Za-z_$][\w$]*\s*,\s*)?|export\s*)\{")
            .unwrap_or_else(|e| panic!("BUG: invalid brace statement regex: {e}"));
}

/// Rewrite ES module syntax into CommonJS.
///
/// Any rewritten export also sets `exports.__esModule = true` once, on the
/// first line or the line ending the directive prologue. Unrecognized
/// statements (dynamic `import()`, decorators, multi-line forms other than
/// brace lists) are left as they are.
#[must_use]
pub fn esm_to_cjs(source: &str) -> String {
    let lines = join_brace_statements(source);
    let mut rewriter = Rewriter::default();

    let mut out: Vec<String> = lines.iter().map(|line| rewriter.rewrite_line(line)).collect();

    if out.first().is_some_and(|first| first.starts_with("#!")) {
        out[0].clear();
    }

    let header = rewriter.header();
    if !header.is_empty() {
        if let Some(i) = directive_prologue_end(&out) {
            let line = &mut out[i];
            line.truncate(line.trim_end().len());
            if !line.ends_with(';') {
                line.push(';');
            }
            line.push(' ');
            line.push_str(&header);
        } else {
            match out.first_mut() {
                Some(first) if first.is_empty() => *first = header,
                Some(first) => *first = format!("{header} {first}"),
                None => out.push(header),
            }
        }
    }

    let mut result = out.join("\n");
    if source.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Index of the last line of a leading `"use strict";` style prologue.
///
/// Blank lines and `//` comments may precede or separate the directives.
fn directive_prologue_end(lines: &[String]) -> Option<usize> {
    let mut last = None;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if !DIRECTIVE_RE.is_match(line) {
            break;
        }
        last = Some(i);
    }
    last
}

/// Join `import {` / `export {` lists that span lines onto their first line.
fn join_brace_statements(source: &str) -> Vec<String> {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();

        if BRACE_STATEMENT_RE.is_match(trimmed) && !trimmed.contains('}') {
            if let Some(offset) = lines[i + 1..].iter().position(|l| l.contains('}')) {
                let end = i + 1 + offset;
                let mut joined = line.trim_end().to_string();
                for next in &lines[i + 1..=end] {
                    joined.push(' ');
                    joined.push_str(next.trim());
                }
                out.push(joined);
                out.extend(std::iter::repeat(String::new()).take(end - i));
                i = end + 1;
                continue;
            }
        }

        out.push(line.to_string());
        i += 1;
    }

    out
}

#[derive(Debug, Default)]
struct Rewriter {
    /// Counter for `__modN` temporaries.
    next_temp: usize,
    /// `(exported name, expression)` getters installed on the first line.
    getters: Vec<(String, String)>,
    has_exports: bool,
}

impl Rewriter {
    fn temp(&mut self) -> String {
        let name = format!("__mod{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    fn header(&self) -> String {
        if !self.has_exports {
            return String::new();
        }

        let mut header = "exports.__esModule = true;".to_string();
        for (name, expr) in &self.getters {
            header.push(' ');
            header.push_str(&define_getter(name, expr));
        }
        header
    }

    fn rewrite_line(&mut self, line: &str) -> String {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("import") && !trimmed.starts_with("export") {
            return line.to_string();
        }
        let indent = &line[..line.len() - trimmed.len()];

        match self.rewrite_statement(trimmed) {
            Some(rewritten) if rewritten.is_empty() => String::new(),
            Some(rewritten) => format!("{indent}{rewritten}"),
            None => line.to_string(),
        }
    }

    fn rewrite_statement(&mut self, stmt: &str) -> Option<String> {
        if let Some(caps) = SIDE_EFFECT_IMPORT_RE.captures(stmt) {
            return Some(format!("require({});", js_string(&caps[1])));
        }

        if let Some(caps) = IMPORT_FROM_RE.captures(stmt) {
            let clause = ImportClause::parse(&caps[1])?;
            return Some(self.rewrite_import(&clause, &caps[2]));
        }

        if let Some(caps) = EXPORT_STAR_AS_RE.captures(stmt) {
            self.has_exports = true;
            return Some(format!("exports.{} = require({});", &caps[1], js_string(&caps[2])));
        }

        if let Some(caps) = EXPORT_STAR_RE.captures(stmt) {
            self.has_exports = true;
            return Some(format!(
                "(function (m) {{ Object.keys(m).forEach(function (k) {{ if (k !== \"default\" && !Object.prototype.hasOwnProperty.call(exports, k)) Object.defineProperty(exports, k, {{ enumerable: true, get: function () {{ return m[k]; }} }}); }}); }})(require({}));",
                js_string(&caps[1])
            ));
        }

        if let Some(caps) = EXPORT_LIST_FROM_RE.captures(stmt) {
            self.has_exports = true;
            let temp = self.temp();
            let mut out = format!("const {temp} = require({});", js_string(&caps[2]));
            for (imported, exported) in parse_specifier_list(&caps[1]) {
                let expr = if imported == "default" {
                    interop_default(&temp)
                } else {
                    format!("{temp}[{}]", js_string(&imported))
                };
                out.push(' ');
                out.push_str(&define_getter(&exported, &expr));
            }
            return Some(out);
        }

        if let Some(caps) = EXPORT_LIST_RE.captures(stmt) {
            self.has_exports = true;
            for (local, exported) in parse_specifier_list(&caps[1]) {
                self.getters.push((exported, local));
            }
            return Some(String::new());
        }

        if let Some(caps) = EXPORT_DEFAULT_FUNCTION_RE.captures(stmt) {
            self.has_exports = true;
            let rest = &stmt[caps.get(1)?.start()..];
            return Some(match caps.get(2) {
                // Function declarations hoist, so the assignment can precede them.
                Some(name) => format!("exports.default = {}; {rest}", name.as_str()),
                None => format!("exports.default = {rest}"),
            });
        }

        if let Some(caps) = EXPORT_DEFAULT_CLASS_RE.captures(stmt) {
            self.has_exports = true;
            let rest = &stmt[caps.get(1)?.start()..];
            return Some(match caps.get(2).filter(|name| name.as_str() != "extends") {
                // Classes do not hoist; the getter reads the binding lazily.
                Some(name) => {
                    self.getters.push(("default".to_string(), name.as_str().to_string()));
                    rest.to_string()
                }
                None => format!("exports.default = {rest}"),
            });
        }

        if let Some(m) = EXPORT_DEFAULT_RE.find(stmt) {
            self.has_exports = true;
            return Some(format!("exports.default = {}", &stmt[m.end()..]));
        }

        if let Some(caps) = EXPORT_DECL_RE.captures(stmt) {
            self.has_exports = true;
            let names = match (caps.get(1), caps.get(2)) {
                (Some(function), _) => vec![function.as_str().to_string()],
                (_, Some(class)) => vec![class.as_str().to_string()],
                _ => declared_names(&stmt[caps.get(0)?.end()..]),
            };
            for name in names {
                self.getters.push((name.clone(), name));
            }
            return Some(stmt["export".len()..].trim_start().to_string());
        }

        None
    }

    fn rewrite_import(&mut self, clause: &ImportClause, specifier: &str) -> String {
        let require = format!("require({})", js_string(specifier));

        if clause.is_type_only {
            return String::new();
        }

        match (&clause.default, &clause.namespace, &clause.named) {
            (None, Some(ns), None) => format!("const {ns} = {require};"),
            (None, None, Some(named)) => format!("const {} = {require};", destructure(named)),
            (None, None, None) => format!("{require};"),
            _ => {
                let temp = self.temp();
                let mut out = format!("const {temp} = {require};");
                if let Some(default) = &clause.default {
                    out.push_str(&format!(" const {default} = {};", interop_default(&temp)));
                }
                if let Some(ns) = &clause.namespace {
                    out.push_str(&format!(" const {ns} = {temp};"));
                }
                if let Some(named) = &clause.named {
                    out.push_str(&format!(" const {} = {temp};", destructure(named)));
                }
                out
            }
        }
    }
}

/// The bindings between `import` and `from`.
#[derive(Debug, Default, PartialEq)]
struct ImportClause {
    default: Option<String>,
    namespace: Option<String>,
    named: Option<Vec<(String, String)>>,
    is_type_only: bool,
}

impl ImportClause {
    fn parse(clause: &str) -> Option<Self> {
        let mut clause = clause.trim();
        let mut parsed = Self::default();

        if let Some(rest) = clause.strip_prefix("type ") {
            let rest = rest.trim_start();
            if rest.starts_with('{') || is_identifier(rest) {
                parsed.is_type_only = true;
                return Some(parsed);
            }
        }

        if !clause.starts_with('{') && !clause.starts_with('*') {
            let (default, rest) = match clause.split_once(',') {
                Some((default, rest)) => (default.trim(), rest.trim()),
                None => (clause, ""),
            };
            if !is_identifier(default) {
                return None;
            }
            parsed.default = Some(default.to_string());
            clause = rest;
        }

        if let Some(rest) = clause.strip_prefix('*') {
            let ns = rest.trim_start().strip_prefix("as")?.trim();
            if !is_identifier(ns) {
                return None;
            }
            parsed.namespace = Some(ns.to_string());
        } else if let Some(rest) = clause.strip_prefix('{') {
            let inner = rest.strip_suffix('}')?;
            parsed.named = Some(parse_specifier_list(inner));
        } else if !clause.is_empty() {
            return None;
        }

        Some(parsed)
    }
}

/// Parse `a, b as c, type T` into `(source, alias)` pairs, dropping type-only entries.
fn parse_specifier_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && !entry.starts_with("type "))
        .map(|entry| match entry.split_once(" as ") {
            Some((source, alias)) => (source.trim().to_string(), alias.trim().to_string()),
            None => (entry.to_string(), entry.to_string()),
        })
        .collect()
}

/// `{ a, b: c }` destructuring pattern for named imports.
fn destructure(named: &[(String, String)]) -> String {
    if named.is_empty() {
        return "{}".to_string();
    }
    let parts: Vec<String> = named
        .iter()
        .map(|(imported, local)| {
            if imported == local {
                local.clone()
            } else {
                format!("{imported}: {local}")
            }
        })
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

fn interop_default(temp: &str) -> String {
    format!("{temp} && {temp}.__esModule ? {temp}.default : {temp}")
}

fn define_getter(name: &str, expr: &str) -> String {
    format!(
        "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {expr}; }} }});",
        js_string(name)
    )
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Names bound by the declarators after `const`/`let`/`var`.
fn declared_names(declarators: &str) -> Vec<String> {
    let declarators = declarators.trim_end().trim_end_matches(';');
    let mut names = Vec::new();

    for declarator in split_top_level(declarators, ',') {
        let binding = match find_top_level(declarator, '=') {
            Some(eq) => &declarator[..eq],
            None => declarator,
        };
        collect_binding_names(binding.trim(), &mut names);
    }

    names
}

/// Collect identifiers bound by a plain name or a destructuring pattern.
fn collect_binding_names(binding: &str, names: &mut Vec<String>) {
    let binding = binding.trim().trim_start_matches("...");

    let (open, close) = match binding.chars().next() {
        Some('{') => ('{', '}'),
        Some('[') => ('[', ']'),
        _ => {
            let ident: String = binding
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
                .collect();
            if is_identifier(&ident) {
                names.push(ident);
            }
            return;
        }
    };

    let inner = binding[open.len_utf8()..]
        .trim_end()
        .strip_suffix(close)
        .unwrap_or(&binding[open.len_utf8()..]);

    for element in split_top_level(inner, ',') {
        let element = element.trim();
        // Drop a default value, then take the local side of `key: local`.
        let element = match find_top_level(element, '=') {
            Some(eq) => &element[..eq],
            None => element,
        };
        let local = if open == '{' {
            match find_top_level(element, ':') {
                Some(colon) => &element[colon + 1..],
                None => element,
            }
        } else {
            element
        };
        collect_binding_names(local, names);
    }
}

/// Split on `sep` outside brackets and string literals.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut scanner = Scanner::default();

    for (i, c) in s.char_indices() {
        if scanner.step(c) && c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Byte index of the first `ch` outside brackets and string literals.
///
/// For `=`, arrow (`=>`) and comparison (`==`) operators are skipped.
fn find_top_level(s: &str, ch: char) -> Option<usize> {
    let mut scanner = Scanner::default();
    let bytes = s.as_bytes();

    for (i, c) in s.char_indices() {
        if !scanner.step(c) || c != ch {
            continue;
        }
        if ch == '=' {
            let next = bytes.get(i + 1).copied();
            let prev = i.checked_sub(1).and_then(|p| bytes.get(p).copied());
            if matches!(next, Some(b'=' | b'>')) || matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) {
                continue;
            }
        }
        return Some(i);
    }
    None
}

/// Tracks bracket depth and string state one character at a time.
#[derive(Debug, Default)]
struct Scanner {
    depth: usize,
    quote: Option<char>,
    escaped: bool,
}

impl Scanner {
    /// Feed one character. Returns true if it sits at depth zero outside a string.
    fn step(&mut self, c: char) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return false;
        }

        match c {
            '"' | '\'' | '`' => {
                self.quote = Some(c);
                false
            }
            '(' | '[' | '{' => {
                self.depth += 1;
                false
            }
            ')' | ']' | '}' => {
                self.depth = self.depth.saturating_sub(1);
                false
            }
            _ => self.depth == 0,
        }
    }
}
