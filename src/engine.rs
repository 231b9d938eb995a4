//! Document and field validation with station type rules layered on top of
//! the schema.

use std::sync::Arc;

use serde_json::Value;

use crate::diagnostics::{
    ExportValidation, FieldValidationResult, RuleKind, ValidationError, ValidationResult,
    ValidationWarning,
};
use crate::error::CompileError;
use crate::path::SchemaPath;
use crate::types::{has_content, StationType, RECOMMENDED_FIELDS};
use crate::validator::ValidatorCache;

/// Field holding a location's station type.
pub const STATION_TYPE_FIELD: &str = "measurement_station_type_id";

const LOGGER_CONFIG_FIELD: &str = "logger_main_config";
const MODEL_CONFIG_FIELD: &str = "model_config";

/// Runs schema validation and business rules.
pub struct ValidationEngine {
    validators: Arc<ValidatorCache>,
}

impl ValidationEngine {
    pub fn new(validators: Arc<ValidatorCache>) -> Self {
        Self { validators }
    }

    pub fn validators(&self) -> &Arc<ValidatorCache> {
        &self.validators
    }

    /// Validate a whole document against the schema.
    ///
    /// Missing recommended root fields are reported as warnings and never
    /// affect `is_valid`.
    pub fn validate_document(&self, document: &Value) -> ValidationResult {
        ValidationResult::new(
            self.schema_errors(document),
            recommended_field_warnings(document),
        )
    }

    /// Validate one value against the fragment at `path`.
    ///
    /// When `path` names the station type field and `parent` (the enclosing
    /// location) is given, station type rules are checked in addition to the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if the fragment at `path` is not a valid schema.
    pub fn validate_field(
        &self,
        path: &str,
        value: &Value,
        parent: Option<&Value>,
    ) -> Result<FieldValidationResult, CompileError> {
        let path = SchemaPath::parse(path);
        let validator = self.validators.validator_for(&path)?;
        let field = path.field_name();

        let mut errors: Vec<ValidationError> = validator
            .iter_errors(value)
            .map(|e| ValidationError::from_schema_error(e, field))
            .collect();

        if field == Some(STATION_TYPE_FIELD) {
            match (value.as_str(), parent) {
                (Some(station), Some(parent)) => {
                    errors.extend(station_type_rules(&StationType::parse(station), parent, ""));
                }
                (Some(_), None) => {
                    tracing::debug!("station type checked without its location, rules skipped");
                }
                _ => {}
            }
        }

        Ok(FieldValidationResult::new(errors, value.clone()))
    }

    /// Check station type rules for one location object.
    ///
    /// Locations without a station type yield no errors here; the schema
    /// reports the missing field.
    pub fn validate_station_type(&self, location: &Value) -> Vec<ValidationError> {
        match StationType::of_location(location) {
            Some(station) => station_type_rules(&station, location, ""),
            None => Vec::new(),
        }
    }

    /// Validate a document for export.
    ///
    /// Runs the schema check plus station type rules for every location,
    /// then splits diagnostics into blocking errors and warnings.
    pub fn validate_for_export(&self, document: &Value) -> ExportValidation {
        let mut errors = self.schema_errors(document);
        if let Some(locations) = document.get("measurement_location").and_then(Value::as_array) {
            for (i, location) in locations.iter().enumerate() {
                if let Some(station) = StationType::of_location(location) {
                    let prefix = format!("measurement_location[{}]", i);
                    errors.extend(station_type_rules(&station, location, &prefix));
                }
            }
        }
        ExportValidation::partition(errors, recommended_field_warnings(document))
    }

    fn schema_errors(&self, document: &Value) -> Vec<ValidationError> {
        self.validators
            .document_validator()
            .iter_errors(document)
            .map(|e| ValidationError::from_schema_error(e, None))
            .collect()
    }
}

/// Station type rules for a location.
///
/// - modelled stations (`reanalysis`, `virtual_met_mast`) must not carry a
///   logger main configuration;
/// - every other station type must not carry a model configuration.
fn station_type_rules(
    station: &StationType,
    location: &Value,
    prefix: &str,
) -> Vec<ValidationError> {
    let carries = |key: &str| location.get(key).is_some_and(has_content);
    let mut errors = Vec::new();

    if station.is_modelled() && carries(LOGGER_CONFIG_FIELD) {
        errors.push(station_error(
            prefix,
            LOGGER_CONFIG_FIELD,
            format!(
                "Logger configuration is not allowed for station type '{}'",
                station.as_str()
            ),
            "Remove the logger main configuration or choose a measured station type",
        ));
    }

    if !station.is_modelled() && carries(MODEL_CONFIG_FIELD) {
        errors.push(station_error(
            prefix,
            MODEL_CONFIG_FIELD,
            format!(
                "Model configuration is only valid for reanalysis or virtual_met_mast stations, not '{}'",
                station.as_str()
            ),
            "Remove the model configuration or set the station type to reanalysis or virtual_met_mast",
        ));
    }

    errors
}

fn station_error(prefix: &str, field: &str, message: String, fix: &str) -> ValidationError {
    let data_path = if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    };
    let rule = RuleKind::StationType;
    ValidationError {
        schema_path: format!("measurement_location.items.properties.{}", field),
        data_path,
        message,
        severity: rule.severity(),
        rule,
        suggested_fix: Some(fix.to_string()),
        allowed_values: None,
    }
}

fn recommended_field_warnings(document: &Value) -> Vec<ValidationWarning> {
    RECOMMENDED_FIELDS
        .iter()
        .filter(|field| !document.get(**field).is_some_and(has_content))
        .map(|field| ValidationWarning::recommended(field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::SchemaAccessor;
    use crate::types::{Severity, ValidatorOptions};
    use serde_json::json;

    fn engine() -> ValidationEngine {
        let accessor = Arc::new(SchemaAccessor::new(json!({
            "type": "object",
            "properties": {
                "author": { "type": "string" },
                "measurement_location": {
                    "type": "array",
                    "items": { "$ref": "#/definitions/location" }
                }
            },
            "required": ["author"],
            "definitions": {
                "location": {
                    "type": "object",
                    "properties": {
                        "measurement_station_type_id": {
                            "type": "string",
                            "enum": ["mast", "lidar", "reanalysis", "virtual_met_mast"]
                        },
                        "logger_main_config": { "type": "array" },
                        "model_config": { "type": "array" }
                    }
                }
            }
        })));
        let cache = ValidatorCache::new(accessor, ValidatorOptions::default()).unwrap();
        ValidationEngine::new(Arc::new(cache))
    }

    const STATION_PATH: &str = "measurement_location.items.properties.measurement_station_type_id";

    #[test]
    fn document_warnings_do_not_affect_validity() {
        let result = engine().validate_document(&json!({ "author": "A" }));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].path, "license");
        assert_eq!(result.warnings[1].path, "plant_name");
    }

    #[test]
    fn recommended_fields_present_no_warnings() {
        let result = engine().validate_document(&json!({
            "author": "A",
            "license": "CC-BY-4.0",
            "plant_name": "Example"
        }));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn reanalysis_with_logger_is_rejected() {
        let parent = json!({
            "measurement_station_type_id": "reanalysis",
            "logger_main_config": [{ "logger_serial_number": "1" }]
        });
        let result = engine()
            .validate_field(STATION_PATH, &json!("reanalysis"), Some(&parent))
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].rule, RuleKind::StationType);
        assert_eq!(result.errors[0].severity, Severity::Error);
        assert!(result.errors[0].message.contains("Logger configuration"));
    }

    #[test]
    fn mast_with_model_config_is_rejected() {
        let parent = json!({
            "measurement_station_type_id": "mast",
            "model_config": [{ "reanalysis": "ERA5" }]
        });
        let result = engine()
            .validate_field(STATION_PATH, &json!("mast"), Some(&parent))
            .unwrap();
        assert!(!result.is_valid);
        assert!(result.errors[0].message.contains("Model configuration"));
    }

    #[test]
    fn empty_configs_are_not_carried() {
        let parent = json!({ "logger_main_config": [], "model_config": null });
        let result = engine()
            .validate_field(STATION_PATH, &json!("virtual_met_mast"), Some(&parent))
            .unwrap();
        assert!(result.is_valid);
    }

    #[test]
    fn rules_add_to_schema_errors() {
        let parent = json!({ "model_config": [{}] });
        let result = engine()
            .validate_field(STATION_PATH, &json!("buoy"), Some(&parent))
            .unwrap();
        let rules: Vec<_> = result.errors.iter().map(|e| e.rule.clone()).collect();
        assert!(rules.contains(&RuleKind::Enum));
        assert!(rules.contains(&RuleKind::StationType));
    }

    #[test]
    fn no_parent_means_schema_only() {
        let result = engine()
            .validate_field(STATION_PATH, &json!("reanalysis"), None)
            .unwrap();
        assert!(result.is_valid);
        assert_eq!(result.value, json!("reanalysis"));
    }

    #[test]
    fn validate_station_type_reads_location() {
        let location = json!({
            "measurement_station_type_id": "lidar",
            "model_config": [{ "reanalysis": "ERA5" }]
        });
        let errors = engine().validate_station_type(&location);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].data_path, "model_config");
    }

    #[test]
    fn export_validation_checks_every_location() {
        let doc = json!({
            "author": "A",
            "measurement_location": [
                { "measurement_station_type_id": "mast" },
                {
                    "measurement_station_type_id": "reanalysis",
                    "logger_main_config": [{}]
                }
            ]
        });
        let gate = engine().validate_for_export(&doc);
        assert!(!gate.can_export);
        assert_eq!(gate.blocking_errors.len(), 1);
        assert_eq!(
            gate.blocking_errors[0].data_path,
            "measurement_location[1].logger_main_config"
        );
    }
}
