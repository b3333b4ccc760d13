//! Parsed package.json descriptors, memoized per package root.
//!
//! Entries live for the resolver's lifetime; there is no invalidation.

use crate::json::{self, JsonValue};
use crate::source::FileSource;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The `type` field of a package.json.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageType {
    Module,
    CommonJs,
    /// Field absent or not a recognized string.
    #[default]
    Unspecified,
}

/// The package.json fields the resolver interprets.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    /// Directory containing the package.json.
    pub root: PathBuf,
    pub name: Option<String>,
    pub package_type: PackageType,
    pub main: Option<String>,
    /// Raw `exports` tree.
    pub exports: Option<JsonValue>,
    /// Raw `imports` tree.
    pub imports: Option<JsonValue>,
}

impl PackageDescriptor {
    /// Extract descriptor fields from a parsed package.json.
    ///
    /// Returns `None` if the document is not an object.
    #[must_use]
    pub fn from_json(root: PathBuf, value: JsonValue) -> Option<Self> {
        let JsonValue::Object(obj) = value else {
            return None;
        };

        let string_field = |key: &str| obj.get(key).and_then(JsonValue::as_str).map(String::from);

        let package_type = match obj.get("type").and_then(JsonValue::as_str) {
            Some("module") => PackageType::Module,
            Some("commonjs") => PackageType::CommonJs,
            _ => PackageType::Unspecified,
        };

        Some(Self {
            name: string_field("name"),
            main: string_field("main").filter(|m| !m.is_empty()),
            package_type,
            exports: obj.get("exports").filter(|v| !v.is_null()).cloned(),
            imports: obj.get("imports").filter(|v| !v.is_null()).cloned(),
            root,
        })
    }

    #[must_use]
    pub fn has_exports(&self) -> bool {
        self.exports.is_some()
    }

    #[must_use]
    pub fn has_imports(&self) -> bool {
        self.imports.is_some()
    }

    #[must_use]
    pub fn is_module(&self) -> bool {
        self.package_type == PackageType::Module
    }

    /// Path of the package.json file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("package.json")
    }
}

/// Outcome of loading `<root>/package.json`.
#[derive(Debug, Clone)]
pub enum PackageLookup {
    Missing,
    /// Present but unreadable or not a JSON object.
    Invalid(String),
    Loaded(Rc<PackageDescriptor>),
}

impl PackageLookup {
    /// The descriptor, treating an invalid package.json as absent.
    #[must_use]
    pub fn descriptor(&self) -> Option<&Rc<PackageDescriptor>> {
        match self {
            Self::Loaded(desc) => Some(desc),
            _ => None,
        }
    }
}

/// Memoizing package.json loader.
#[derive(Debug, Default)]
pub struct PackageCache {
    entries: RefCell<HashMap<PathBuf, PackageLookup>>,
}

impl PackageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the package.json at `root`, parsing it at most once.
    pub fn load(&self, source: &dyn FileSource, root: &Path) -> PackageLookup {
        if let Some(hit) = self.entries.borrow().get(root) {
            return hit.clone();
        }

        let lookup = read_descriptor(source, root);
        self.entries
            .borrow_mut()
            .insert(root.to_path_buf(), lookup.clone());
        lookup
    }

    /// Find the closest package.json at or above `dir`.
    ///
    /// An invalid package.json still stops the search.
    pub fn find_nearest(&self, source: &dyn FileSource, dir: &Path) -> PackageLookup {
        for ancestor in dir.ancestors() {
            match self.load(source, ancestor) {
                PackageLookup::Missing => continue,
                found => return found,
            }
        }
        PackageLookup::Missing
    }

    /// Number of memoized roots, including misses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

fn read_descriptor(source: &dyn FileSource, root: &Path) -> PackageLookup {
    let manifest = root.join("package.json");
    if !source.exists_file(&manifest) {
        return PackageLookup::Missing;
    }

    let bytes = match source.read_file(&manifest) {
        Ok(bytes) => bytes,
        Err(e) => return PackageLookup::Invalid(e.to_string()),
    };

    let text = String::from_utf8_lossy(&bytes);
    let value = match json::parse(&text) {
        Ok(value) => value,
        Err(e) => return PackageLookup::Invalid(e.to_string()),
    };

    match PackageDescriptor::from_json(root.to_path_buf(), value) {
        Some(desc) => PackageLookup::Loaded(Rc::new(desc)),
        None => PackageLookup::Invalid("package.json is not an object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BundleSource, DiskSource};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_descriptor_fields() {
        let value = json::parse(
            r##"{"name": "pkg", "type": "module", "main": "lib/index.js",
                "exports": {".": "./index.js"}, "imports": {"#a": "./a.js"}}"##,
        )
        .unwrap();
        let desc = PackageDescriptor::from_json(PathBuf::from("/p"), value).unwrap();
        assert_eq!(desc.name.as_deref(), Some("pkg"));
        assert!(desc.is_module());
        assert_eq!(desc.main.as_deref(), Some("lib/index.js"));
        assert!(desc.has_exports());
        assert!(desc.has_imports());
        assert_eq!(desc.manifest_path(), PathBuf::from("/p/package.json"));
    }

    #[test]
    fn test_descriptor_defaults() {
        let value = json::parse(r#"{"type": "weird", "exports": null}"#).unwrap();
        let desc = PackageDescriptor::from_json(PathBuf::new(), value).unwrap();
        assert_eq!(desc.package_type, PackageType::Unspecified);
        assert!(!desc.has_exports());
        assert!(desc.main.is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        let value = json::parse("[1]").unwrap();
        assert!(PackageDescriptor::from_json(PathBuf::new(), value).is_none());
    }

    #[test]
    fn test_cache_memoizes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "a"}"#).unwrap();

        let cache = PackageCache::new();
        let first = cache.load(&DiskSource, dir.path());
        let first = first.descriptor().unwrap().clone();

        // Changes on disk are not observed.
        fs::write(dir.path().join("package.json"), r#"{"name": "b"}"#).unwrap();
        let second = cache.load(&DiskSource, dir.path());
        assert!(Rc::ptr_eq(&first, second.descriptor().unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_and_missing() {
        let bundle = BundleSource::from_entries([("bad/package.json", "{nope")]);
        let cache = PackageCache::new();
        assert!(matches!(
            cache.load(&bundle, Path::new("bad")),
            PackageLookup::Invalid(_)
        ));
        assert!(matches!(
            cache.load(&bundle, Path::new("none")),
            PackageLookup::Missing
        ));
    }

    #[test]
    fn test_find_nearest() {
        let bundle = BundleSource::from_entries([
            ("package.json", r#"{"name": "root", "type": "module"}"#),
            ("sub/deep/file.js", ""),
        ]);
        let cache = PackageCache::new();
        let found = cache.find_nearest(&bundle, Path::new("sub/deep"));
        assert_eq!(found.descriptor().unwrap().name.as_deref(), Some("root"));
    }
}
