//! User-facing diagnostics and the mapping from raw validator errors.
//!
//! | Rule      | Message                                           | Severity |
//! |-----------|---------------------------------------------------|----------|
//! | required  | `Required field '<name>' is missing`              | error    |
//! | enum      | `Invalid value for <field>. Must be one of: ...`  | error    |
//! | type      | `Expected <type> but received <type>`             | error    |
//! | minimum   | `Value must be at least <limit>`                  | error    |
//! | maximum   | `Value must be at most <limit>`                   | error    |
//! | format    | `Invalid <format> format for <field>`             | warning  |
//! | pattern   | `Value does not match required pattern`           | warning  |
//! | other     | raw validator message                             | warning  |

use jsonschema::error::{TypeKind, ValidationErrorKind};
use serde::Serialize;
use serde_json::Value;

use crate::path::pointer_to_dotted;
use crate::types::{json_type_name, Severity};

/// Which rule produced a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Required,
    Enum,
    Format,
    Minimum,
    Maximum,
    Type,
    Pattern,
    /// Cross-field station type rule, not expressible in the schema.
    StationType,
    /// Any other schema keyword, by name.
    Other(String),
}

impl RuleKind {
    /// Structural violations block export; anomalies only warn.
    pub fn severity(&self) -> Severity {
        match self {
            RuleKind::Required
            | RuleKind::Type
            | RuleKind::Enum
            | RuleKind::Minimum
            | RuleKind::Maximum
            | RuleKind::StationType => Severity::Error,
            RuleKind::Format | RuleKind::Pattern | RuleKind::Other(_) => Severity::Warning,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuleKind::Required => "required",
            RuleKind::Enum => "enum",
            RuleKind::Format => "format",
            RuleKind::Minimum => "minimum",
            RuleKind::Maximum => "maximum",
            RuleKind::Type => "type",
            RuleKind::Pattern => "pattern",
            RuleKind::StationType => "station_type",
            RuleKind::Other(keyword) => keyword,
        }
    }
}

/// One diagnostic against a document or field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Location of the violated rule in the schema.
    pub schema_path: String,
    /// Dotted location of the offending value, e.g. `measurement_location[0].name`.
    pub data_path: String,
    pub message: String,
    pub rule: RuleKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl ValidationError {
    /// Map a raw validator error.
    ///
    /// `field` labels the value when the error sits at the root of the
    /// validated instance, as happens for single-field validation.
    pub fn from_schema_error(error: jsonschema::ValidationError<'_>, field: Option<&str>) -> Self {
        let raw_message = error.to_string();
        let actual_type = json_type_name(&error.instance);
        let schema_path = error.schema_path.to_string();
        let instance_path = error.instance_path.to_string();
        let data_path = pointer_to_dotted(&instance_path);
        let label = last_field(&instance_path)
            .or(field)
            .unwrap_or("value")
            .to_string();

        let mut suggested_fix = None;
        let mut allowed_values = None;
        let (rule, message) = match error.kind {
            ValidationErrorKind::Required { property } => {
                let name = display_value(&property);
                suggested_fix = Some(format!("The field '{}' is required", name));
                (
                    RuleKind::Required,
                    format!("Required field '{}' is missing", name),
                )
            }
            ValidationErrorKind::Enum { options } => {
                let allowed = options.as_array().cloned().unwrap_or_default();
                let list = allowed
                    .iter()
                    .map(display_value)
                    .collect::<Vec<_>>()
                    .join(", ");
                suggested_fix = Some(format!("Must be one of: {}", list));
                allowed_values = Some(allowed);
                (
                    RuleKind::Enum,
                    format!("Invalid value for {}. Must be one of: {}", label, list),
                )
            }
            ValidationErrorKind::Format { format } => {
                suggested_fix = Some(format!("Must be in {} format", format));
                (
                    RuleKind::Format,
                    format!("Invalid {} format for {}", format, label),
                )
            }
            ValidationErrorKind::Minimum { limit } => {
                let message = format!("Value must be at least {}", display_value(&limit));
                suggested_fix = Some(message.clone());
                (RuleKind::Minimum, message)
            }
            ValidationErrorKind::Maximum { limit } => {
                let message = format!("Value must be at most {}", display_value(&limit));
                suggested_fix = Some(message.clone());
                (RuleKind::Maximum, message)
            }
            ValidationErrorKind::Type { kind } => {
                let expected = match kind {
                    TypeKind::Single(ty) => ty.to_string(),
                    TypeKind::Multiple(types) => types
                        .into_iter()
                        .map(|ty| ty.to_string())
                        .collect::<Vec<_>>()
                        .join(" or "),
                };
                (
                    RuleKind::Type,
                    format!("Expected {} but received {}", expected, actual_type),
                )
            }
            ValidationErrorKind::Pattern { .. } => (
                RuleKind::Pattern,
                "Value does not match required pattern".to_string(),
            ),
            _ => {
                let keyword = schema_path.rsplit('/').next().unwrap_or_default();
                let message = if raw_message.is_empty() {
                    "Validation error".to_string()
                } else {
                    raw_message
                };
                (RuleKind::Other(keyword.to_string()), message)
            }
        };

        Self {
            severity: rule.severity(),
            schema_path,
            data_path,
            message,
            rule,
            suggested_fix,
            allowed_values,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.data_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.data_path, self.message)
        }
    }
}

/// Advisory notice that never affects validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationWarning {
    /// A notice without a location, such as a cleaning step note.
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Notice for a recommended root field that is absent or empty.
    pub fn recommended(field: &str) -> Self {
        Self {
            path: field.to_string(),
            message: format!("Recommended field '{}' is missing", field),
            suggestion: Some(format!(
                "Consider providing '{}' to make the document easier to reuse",
                field
            )),
        }
    }
}

impl From<&ValidationError> for ValidationWarning {
    fn from(error: &ValidationError) -> Self {
        Self {
            path: error.data_path.clone(),
            message: error.message.clone(),
            suggestion: error.suggested_fix.clone(),
        }
    }
}

/// Outcome of validating a whole document.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// Always equal to `errors.is_empty()`.
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new(errors: Vec<ValidationError>, warnings: Vec<ValidationWarning>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Outcome of validating one field value.
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    /// The value that was checked.
    pub value: Value,
}

impl FieldValidationResult {
    pub fn new(errors: Vec<ValidationError>, value: Value) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            value,
        }
    }
}

/// Export gate: diagnostics split by whether they block.
#[derive(Debug, Clone, Serialize)]
pub struct ExportValidation {
    /// True iff `blocking_errors` is empty.
    pub can_export: bool,
    pub blocking_errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ExportValidation {
    /// Partition diagnostics by severity and append advisory notices.
    pub fn partition(errors: Vec<ValidationError>, advisories: Vec<ValidationWarning>) -> Self {
        let (blocking_errors, soft): (Vec<_>, Vec<_>) =
            errors.into_iter().partition(ValidationError::is_blocking);
        let mut warnings: Vec<ValidationWarning> =
            soft.iter().map(ValidationWarning::from).collect();
        warnings.extend(advisories);
        Self {
            can_export: blocking_errors.is_empty(),
            blocking_errors,
            warnings,
        }
    }
}

/// Render a value for a message: strings bare, everything else as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Last non-index segment of a JSON Pointer.
fn last_field(pointer: &str) -> Option<&str> {
    pointer
        .rsplit('/')
        .find(|part| !part.is_empty() && !part.bytes().all(|b| b.is_ascii_digit()))
}
