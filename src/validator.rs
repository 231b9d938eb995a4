//! Compiled validator cache.
//!
//! One validator is compiled for the whole document at construction; field
//! validators are compiled on first request and kept for the lifetime of the
//! cache. The schema never changes after load, so entries are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use jsonschema::Validator;
use serde_json::{Map, Value};

use crate::accessor::SchemaAccessor;
use crate::error::CompileError;
use crate::path::SchemaPath;
use crate::types::ValidatorOptions;

/// Shared handle to a compiled validator.
pub type CompiledValidator = Arc<Validator>;

/// Validators keyed by schema path.
pub struct ValidatorCache {
    accessor: Arc<SchemaAccessor>,
    options: ValidatorOptions,
    document: CompiledValidator,
    fields: RwLock<HashMap<SchemaPath, CompiledValidator>>,
}

impl ValidatorCache {
    /// Compile the document validator for the accessor's schema.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if the schema document is not a valid JSON Schema.
    pub fn new(
        accessor: Arc<SchemaAccessor>,
        options: ValidatorOptions,
    ) -> Result<Self, CompileError> {
        let document = Arc::new(compile(accessor.root(), &SchemaPath::root(), &options)?);
        Ok(Self {
            accessor,
            options,
            document,
            fields: RwLock::new(HashMap::new()),
        })
    }

    pub fn accessor(&self) -> &Arc<SchemaAccessor> {
        &self.accessor
    }

    /// The validator for the whole schema document.
    pub fn document_validator(&self) -> CompiledValidator {
        Arc::clone(&self.document)
    }

    /// The validator for the fragment at `path`, compiled on first use.
    ///
    /// Paths that do not resolve compile to an empty schema that accepts
    /// every value.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if the fragment is not a valid JSON Schema.
    pub fn validator_for(&self, path: &SchemaPath) -> Result<CompiledValidator, CompileError> {
        if let Some(hit) = self
            .fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(Arc::clone(hit));
        }

        let fragment = self
            .accessor
            .try_resolve(path)
            .map(|f| self.with_definitions(&f))
            .unwrap_or_else(|| Value::Object(Map::new()));
        let validator = Arc::new(compile(&fragment, path, &self.options)?);
        tracing::debug!(path = %path, "compiled field validator");

        let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(fields.entry(path.clone()).or_insert(validator)))
    }

    /// Number of field validators compiled so far.
    pub fn compiled_fields(&self) -> usize {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copy the root `definitions` into a fragment so its local refs resolve
    /// when compiled on its own.
    fn with_definitions(&self, fragment: &Value) -> Value {
        let mut fragment = fragment.clone();
        if let (Value::Object(map), Some(defs)) = (&mut fragment, self.accessor.definitions()) {
            map.entry("definitions")
                .or_insert_with(|| Value::Object(defs.clone()));
        }
        fragment
    }
}

fn compile(
    schema: &Value,
    path: &SchemaPath,
    options: &ValidatorOptions,
) -> Result<Validator, CompileError> {
    jsonschema::options()
        .with_draft(options.draft)
        .should_validate_formats(options.validate_formats)
        .build(schema)
        .map_err(|e| CompileError {
            path: path.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> ValidatorCache {
        let accessor = Arc::new(SchemaAccessor::new(json!({
            "type": "object",
            "properties": {
                "points": {
                    "type": "array",
                    "items": { "$ref": "#/definitions/point" }
                }
            },
            "definitions": {
                "point": {
                    "type": "object",
                    "properties": { "height_m": { "type": "number", "minimum": 0 } },
                    "required": ["height_m"]
                }
            }
        })));
        ValidatorCache::new(accessor, ValidatorOptions::default()).unwrap()
    }

    #[test]
    fn document_validator_is_eager() {
        let cache = cache();
        assert!(cache.document_validator().is_valid(&json!({ "points": [] })));
        assert!(!cache
            .document_validator()
            .is_valid(&json!({ "points": [{}] })));
        assert_eq!(cache.compiled_fields(), 0);
    }

    #[test]
    fn field_validator_resolves_local_refs() {
        let cache = cache();
        let validator = cache
            .validator_for(&SchemaPath::parse("points.items"))
            .unwrap();
        assert!(validator.is_valid(&json!({ "height_m": 10 })));
        assert!(!validator.is_valid(&json!({ "height_m": -1 })));
    }

    #[test]
    fn field_validators_are_memoized() {
        let cache = cache();
        let path = SchemaPath::parse("points.items.properties.height_m");
        let first = cache.validator_for(&path).unwrap();
        let second = cache.validator_for(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.compiled_fields(), 1);
    }

    #[test]
    fn unresolved_path_accepts_anything() {
        let cache = cache();
        let validator = cache
            .validator_for(&SchemaPath::parse("does.not.exist"))
            .unwrap();
        assert!(validator.is_valid(&json!("whatever")));
    }
}
