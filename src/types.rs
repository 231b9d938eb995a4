//! Core types and options shared across the WRA toolkit.

use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root fields that must be present for a document to be complete.
pub const REQUIRED_CHECKLIST: &[&str] = &[
    "author",
    "organisation",
    "date",
    "version",
    "plant_name",
    "plant_type",
    "license",
    "measurement_location",
];

/// Optional root fields that produce advisory warnings when absent.
pub const RECOMMENDED_FIELDS: &[&str] = &["license", "plant_name"];

/// Fields that only exist to drive the form and never belong in an export.
pub const FORM_ONLY_FIELDS: &[&str] = &[
    "update_at",
    "temp_id",
    "form_helper_fields",
    "ui_state",
    "validation_state",
    "is_dirty",
    "last_modified_by",
];

/// Default file name for downloaded exports.
pub const DEFAULT_EXPORT_FILENAME: &str = "iea-task43-export.json";

/// MIME type of serialized exports.
pub const EXPORT_MIME_TYPE: &str = "application/json";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Returns true when a value carries content: not null, not a blank string,
/// not an empty array or object.
pub fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Severity of a diagnostic. Only errors block export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Classification of a measurement location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StationType {
    Mast,
    Lidar,
    Sodar,
    FloatingLidar,
    Solar,
    Adcp,
    Reanalysis,
    VirtualMetMast,
    Other(String),
}

impl StationType {
    /// Parse the `measurement_station_type_id` value.
    pub fn parse(s: &str) -> Self {
        match s {
            "mast" => StationType::Mast,
            "lidar" => StationType::Lidar,
            "sodar" => StationType::Sodar,
            "flidar" => StationType::FloatingLidar,
            "solar" => StationType::Solar,
            "adcp" => StationType::Adcp,
            "reanalysis" => StationType::Reanalysis,
            "virtual_met_mast" => StationType::VirtualMetMast,
            other => StationType::Other(other.to_string()),
        }
    }

    /// Read the station type of a location object, if it has one.
    pub fn of_location(location: &Value) -> Option<Self> {
        location
            .get("measurement_station_type_id")
            .and_then(Value::as_str)
            .map(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        match self {
            StationType::Mast => "mast",
            StationType::Lidar => "lidar",
            StationType::Sodar => "sodar",
            StationType::FloatingLidar => "flidar",
            StationType::Solar => "solar",
            StationType::Adcp => "adcp",
            StationType::Reanalysis => "reanalysis",
            StationType::VirtualMetMast => "virtual_met_mast",
            StationType::Other(s) => s,
        }
    }

    /// Modelled stations have no physical logger.
    pub fn is_modelled(&self) -> bool {
        matches!(self, StationType::Reanalysis | StationType::VirtualMetMast)
    }

    /// Remote-sensing devices described by `vertical_profiler_properties`.
    pub fn is_vertical_profiler(&self) -> bool {
        matches!(
            self,
            StationType::Lidar | StationType::Sodar | StationType::FloatingLidar
        )
    }
}

/// Options for compiling validators.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorOptions {
    /// JSON Schema draft used when compiling fragments.
    pub draft: Draft,
    /// Whether `format` keywords are checked. Formats are the only place
    /// the validation library may interpret strings; types are never coerced.
    pub validate_formats: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            draft: Draft::Draft7,
            validate_formats: true,
        }
    }
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(mut self, draft: Draft) -> Self {
        self.draft = draft;
        self
    }

    pub fn validate_formats(mut self, validate: bool) -> Self {
        self.validate_formats = validate;
        self
    }
}

/// Options for the export pipeline.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Pretty-print with two-space indents.
    pub pretty: bool,
    /// Keep form-only fields instead of stripping them.
    pub keep_form_fields: bool,
    /// Field names stripped before export. A trailing `*` matches by prefix.
    pub form_only_fields: Vec<String>,
    /// File name used when the export is saved.
    pub filename: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            keep_form_fields: false,
            form_only_fields: FORM_ONLY_FIELDS.iter().map(|s| s.to_string()).collect(),
            filename: DEFAULT_EXPORT_FILENAME.to_string(),
        }
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn keep_form_fields(mut self, keep: bool) -> Self {
        self.keep_form_fields = keep;
        self
    }

    /// Add a field name (or `prefix*` pattern) to the strip list.
    pub fn strip_field(mut self, pattern: impl Into<String>) -> Self {
        self.form_only_fields.push(pattern.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Returns true when `key` matches an entry of the strip list.
    pub fn is_form_only(&self, key: &str) -> bool {
        self.form_only_fields
            .iter()
            .any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => key.starts_with(prefix),
                None => key == pattern,
            })
    }
}
