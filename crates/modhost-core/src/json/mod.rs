//! Minimal JSON reader used for `package.json`.
//!
//! The tree is a plain tagged union. Object keys keep document order, which
//! matters for `exports`/`imports` pattern scanning (first match wins).

mod parser;

pub use parser::{parse, JsonError, MAX_DEPTH};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// An ordered JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonObject {
    entries: Vec<(String, JsonValue)>,
    /// Key to position in `entries`.
    index: HashMap<String, usize>,
}

impl JsonObject {
    /// Create an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key. A duplicate key replaces the earlier value in place.
    pub fn insert(&mut self, key: String, value: JsonValue) {
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].1 = value;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterate entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(JsonObject),
}

impl JsonValue {
    /// Look up a key if this value is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        match self {
            Self::Object(obj) => obj.get(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&JsonObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[JsonValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }
}

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (key, value) in obj.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keeps_document_order() {
        let value = parse(r#"{"b": 1, "a": 2, "c": 3}"#).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_key_replaces_in_place() {
        let value = parse(r#"{"a": 1, "b": 2, "a": 3}"#).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj.get("a").and_then(JsonValue::as_f64), Some(3.0));
        assert_eq!(obj.keys().next(), Some("a"));
    }

    #[test]
    fn test_many_keys_keep_order_and_lookup() {
        let body: Vec<String> = (0..2000).map(|i| format!("\"k{i}\": {i}")).collect();
        let text = format!("{{{}, \"k7\": -1}}", body.join(", "));
        let value = parse(&text).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 2000);
        assert_eq!(obj.get("k1999").and_then(JsonValue::as_f64), Some(1999.0));
        assert_eq!(obj.get("k7").and_then(JsonValue::as_f64), Some(-1.0));
        assert!(obj.contains_key("k0"));
        assert!(!obj.contains_key("k2000"));
        assert_eq!(obj.keys().nth(7), Some("k7"));
        assert_eq!(obj.keys().last(), Some("k1999"));
    }

    #[test]
    fn test_serialize_through_serde_json() {
        let value = parse(r#"{"name": "pkg", "exports": {".": ["./a.js", null]}}"#).unwrap();
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"name":"pkg","exports":{".":["./a.js",null]}}"#);
    }

    #[test]
    fn test_accessors() {
        let value = parse(r#"{"s": "x", "n": 2.5, "t": true, "z": null, "l": [1]}"#).unwrap();
        assert_eq!(value.get("s").and_then(JsonValue::as_str), Some("x"));
        assert_eq!(value.get("n").and_then(JsonValue::as_f64), Some(2.5));
        assert_eq!(value.get("t").and_then(JsonValue::as_bool), Some(true));
        assert!(value.get("z").is_some_and(JsonValue::is_null));
        assert_eq!(value.get("l").and_then(JsonValue::as_array).map(<[_]>::len), Some(1));
        assert_eq!(value.get("missing"), None);
        assert_eq!(value.kind(), "object");
    }
}
