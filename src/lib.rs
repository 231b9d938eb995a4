//! IEA Task 43 WRA Schema Toolkit
//!
//! Validation, cleaning and export of Wind Resource Assessment documents
//! described by the IEA Wind Task 43 JSON Schema.
//!
//! The toolkit consumes a raw form-state value and the schema document, and
//! produces validation results, schema-compliant export documents and CSV
//! data templates. It renders nothing.
//!
//! # Example
//!
//! ```
//! use wra_schema::WraToolkit;
//! use serde_json::json;
//!
//! let toolkit = WraToolkit::bundled().unwrap();
//!
//! let field = toolkit
//!     .engine()
//!     .validate_field(
//!         "measurement_location.items.properties.latitude_ddeg",
//!         &json!(100),
//!         None,
//!     )
//!     .unwrap();
//! assert!(!field.is_valid);
//! assert_eq!(field.errors[0].message, "Value must be at most 90");
//!
//! let form = json!({
//!     "author": "Jane Analyst",
//!     "organisation": "Example Wind",
//!     "date": "2024-03-01",
//!     "version": "1.3.0-2024.03",
//!     "temp_id": "draft-7",
//!     "measurement_location": []
//! });
//! let outcome = toolkit.exporter().export(&form).unwrap();
//! assert!(outcome.can_export());
//! assert!(!outcome.json().unwrap().contains("temp_id"));
//! ```
//!
//! # Export steps
//!
//! | Step                  | Effect                                                    |
//! |-----------------------|-----------------------------------------------------------|
//! | strip form fields     | drop `temp_id`, `ui_state`, ... (recorded in the report)  |
//! | station layout        | resolve sensor references, drop mismatched device props  |
//! | prune                 | drop nulls, blank strings, empty arrays and objects       |
//! | repair                | reinstate `measurement_location` / `measurement_point`    |
//! | validate              | schema + station type rules; errors block, warnings pass |

mod accessor;
mod context;
mod csv_template;
mod diagnostics;
mod engine;
mod error;
mod export;
mod loader;
mod path;
mod types;
mod validator;

pub use accessor::SchemaAccessor;
pub use context::{ToolkitError, WraToolkit};
pub use csv_template::{ColumnSpec, CsvTemplateGenerator, CsvTemplateOptions};
pub use diagnostics::{
    ExportValidation, FieldValidationResult, RuleKind, ValidationError, ValidationResult,
    ValidationWarning,
};
pub use engine::{ValidationEngine, STATION_TYPE_FIELD};
pub use error::{CompileError, ExportError, LoadError, TemplateError};
pub use export::{
    BlockedExport, CleanedDocument, CleaningReport, ExportFile, ExportOutcome, ExportPipeline,
    ExportPreview, ExportStatistics, ExportedDocument,
};
pub use loader::{
    bundled_schema, is_url, load_schema, load_schema_auto, load_schema_str, BUNDLED_SCHEMA,
};
pub use path::{PathSegment, SchemaPath};
pub use types::{
    json_type_name, ExportOptions, Severity, StationType, ValidatorOptions,
    DEFAULT_EXPORT_FILENAME, EXPORT_MIME_TYPE, FORM_ONLY_FIELDS, RECOMMENDED_FIELDS,
    REQUIRED_CHECKLIST,
};
pub use validator::{CompiledValidator, ValidatorCache};

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
