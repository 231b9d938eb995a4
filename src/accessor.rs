//! Read-only navigation of the schema document.
//!
//! The schema is immutable once loaded, so every resolved fragment is
//! memoized for the lifetime of the accessor and never invalidated.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::path::{PathSegment, SchemaPath};

/// Upper bound on chained `$ref` hops, guards against reference cycles.
const MAX_REF_HOPS: usize = 32;

/// Path-based view over one schema document.
#[derive(Debug)]
pub struct SchemaAccessor {
    root: Value,
    fragments: RwLock<HashMap<SchemaPath, Option<Arc<Value>>>>,
}

impl SchemaAccessor {
    pub fn new(root: Value) -> Self {
        Self {
            root,
            fragments: RwLock::new(HashMap::new()),
        }
    }

    /// The whole schema document.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The root `definitions` map, if the schema has one.
    pub fn definitions(&self) -> Option<&Map<String, Value>> {
        self.root.get("definitions").and_then(Value::as_object)
    }

    /// Resolve a dotted path, returning `{}` when any segment misses.
    ///
    /// An empty fragment means "no constraints"; callers must not treat it
    /// as an error.
    pub fn resolve(&self, path: &str) -> Arc<Value> {
        self.try_resolve(&SchemaPath::parse(path))
            .unwrap_or_else(|| Arc::new(Value::Object(Map::new())))
    }

    /// Resolve a parsed path, returning `None` when any segment misses.
    ///
    /// `$ref` pointers met before a segment are followed first. The returned
    /// fragment itself may still be a `$ref`; see [`Self::resolve_dereferenced`].
    pub fn try_resolve(&self, path: &SchemaPath) -> Option<Arc<Value>> {
        if let Some(hit) = self
            .fragments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return hit.clone();
        }

        let resolved = self.walk(path).map(|v| Arc::new(v.clone()));
        self.fragments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), resolved.clone());
        resolved
    }

    /// Resolve a path and follow a `$ref` on the final fragment.
    pub fn resolve_dereferenced(&self, path: &SchemaPath) -> Option<Value> {
        let fragment = self.try_resolve(path)?;
        self.follow_refs(&fragment).cloned()
    }

    /// Allowed values of the enum at `path`, empty when there is none.
    pub fn enum_values(&self, path: &str) -> Vec<Value> {
        self.resolve_dereferenced(&SchemaPath::parse(path))
            .and_then(|f| f.get("enum").and_then(Value::as_array).cloned())
            .unwrap_or_default()
    }

    /// Names listed in the `required` array at `path`.
    pub fn required_fields(&self, path: &str) -> BTreeSet<String> {
        self.resolve_dereferenced(&SchemaPath::parse(path))
            .and_then(|f| {
                f.get("required").and_then(Value::as_array).map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    /// Scaffold a value for the object schema at `path`.
    ///
    /// Only required properties are populated, each with its default, its
    /// first enum value, or the zero value of its type. Non-object fragments
    /// yield their own default value.
    pub fn default_object(&self, path: &str) -> Value {
        match self.resolve_dereferenced(&SchemaPath::parse(path)) {
            Some(fragment) => self.scaffold_object(&fragment),
            None => Value::Object(Map::new()),
        }
    }

    /// Follow `$ref` pointers until a non-reference fragment is reached.
    ///
    /// Only document-local refs (`#/...`) are followed.
    pub fn follow_refs<'a>(&'a self, mut fragment: &'a Value) -> Option<&'a Value> {
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = fragment.get("$ref").and_then(Value::as_str) else {
                return Some(fragment);
            };
            let pointer = reference.strip_prefix('#')?;
            fragment = if pointer.is_empty() {
                &self.root
            } else {
                self.root.pointer(pointer)?
            };
        }
        None
    }

    fn walk(&self, path: &SchemaPath) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = self.follow_refs(current)?;
            current = match segment {
                PathSegment::Items => current.get("items")?,
                PathSegment::Properties => current.get("properties")?,
                PathSegment::Index(i) => match current {
                    Value::Array(arr) => arr.get(*i)?,
                    other => other.get("items")?,
                },
                PathSegment::Property(name) => current
                    .get("properties")
                    .and_then(|props| props.get(name))
                    .or_else(|| current.get(name))?,
            };
        }
        Some(current)
    }

    fn scaffold_object(&self, fragment: &Value) -> Value {
        let Some(props) = fragment.get("properties").and_then(Value::as_object) else {
            return self.default_value(fragment);
        };
        let required = fragment
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut result = Map::new();
        for name in required {
            let value = props
                .get(name)
                .and_then(|prop| self.follow_refs(prop))
                .map(|prop| self.default_value(prop))
                .unwrap_or(Value::Null);
            result.insert(name.to_string(), value);
        }
        Value::Object(result)
    }

    fn default_value(&self, fragment: &Value) -> Value {
        if let Some(default) = fragment.get("default") {
            return default.clone();
        }
        if let Some(first) = fragment
            .get("enum")
            .and_then(Value::as_array)
            .and_then(|e| e.first())
        {
            return first.clone();
        }
        let ty = match fragment.get("type") {
            Some(Value::String(t)) => Some(t.as_str()),
            Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).next(),
            _ => None,
        };
        match ty {
            Some("string") => Value::String(String::new()),
            Some("number") | Some("integer") => Value::from(0),
            Some("boolean") => Value::Bool(false),
            Some("array") => Value::Array(Vec::new()),
            Some("object") => Value::Object(Map::new()),
            _ => Value::Null,
        }
    }
}
