//! Export pipeline: turn form state into a schema-compliant document.
//!
//! ```text
//! clone -> strip form-only fields -> apply station layout -> prune empty values
//!       -> repair required structure -> validate -> serialize | block
//! ```
//!
//! Every step builds on a private copy; the caller's form value is only ever
//! borrowed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::diagnostics::{ExportValidation, ValidationError, ValidationWarning};
use crate::engine::{ValidationEngine, STATION_TYPE_FIELD};
use crate::error::ExportError;
use crate::types::{
    has_content, json_type_name, ExportOptions, StationType, EXPORT_MIME_TYPE,
    REQUIRED_CHECKLIST,
};

/// Arrays the schema requires even when empty. Pruning keeps them.
const STRUCTURAL_ARRAYS: &[&str] = &["measurement_location", "measurement_point"];

/// Location-level sensor pool used by the form; not part of the schema.
const SENSOR_POOL_FIELD: &str = "sensors";

const MAST_PROPERTIES: &str = "mast_properties";
const PROFILER_PROPERTIES: &str = "vertical_profiler_properties";

/// Audit trail of what cleaning changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    /// Dotted paths of removed fields, e.g. `measurement_location[0].temp_id`.
    pub removed_field_paths: Vec<String>,
    pub warnings: Vec<String>,
}

impl CleaningReport {
    fn removed(&mut self, path: String) {
        tracing::debug!(path = %path, "removed field from export");
        self.removed_field_paths.push(path);
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// A cleaned document and the report of how it was produced.
#[derive(Debug, Clone)]
pub struct CleanedDocument {
    pub document: Value,
    pub report: CleaningReport,
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    /// Serialized document.
    pub json: String,
    pub document: Value,
    pub warnings: Vec<ValidationWarning>,
    pub removed_fields: Vec<String>,
    filename: String,
}

impl ExportedDocument {
    /// The export as a downloadable file with the configured name.
    pub fn file(&self) -> ExportFile {
        self.file_named(&self.filename)
    }

    pub fn file_named(&self, filename: &str) -> ExportFile {
        ExportFile {
            filename: filename.to_string(),
            mime_type: EXPORT_MIME_TYPE,
            contents: self.json.clone(),
        }
    }
}

/// Export refused because blocking errors remain after cleaning.
#[derive(Debug, Clone)]
pub struct BlockedExport {
    pub blocking_errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    /// The cleaned document, for inspection only; it is never serialized.
    pub cleaned: Value,
    pub removed_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Exported(ExportedDocument),
    Blocked(BlockedExport),
}

impl ExportOutcome {
    pub fn can_export(&self) -> bool {
        matches!(self, ExportOutcome::Exported(_))
    }

    /// Serialized output, present only when the export succeeded.
    pub fn json(&self) -> Option<&str> {
        match self {
            ExportOutcome::Exported(doc) => Some(&doc.json),
            ExportOutcome::Blocked(_) => None,
        }
    }

    pub fn blocking_errors(&self) -> &[ValidationError] {
        match self {
            ExportOutcome::Exported(_) => &[],
            ExportOutcome::Blocked(blocked) => &blocked.blocking_errors,
        }
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        match self {
            ExportOutcome::Exported(doc) => &doc.warnings,
            ExportOutcome::Blocked(blocked) => &blocked.warnings,
        }
    }
}

/// A serialized export ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub contents: String,
}

impl ExportFile {
    /// Write the file into `dir`, returning its full path.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Write` if the file cannot be written.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.contents).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Side-effect free look at what an export would produce.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPreview {
    /// Serialized cleaned document, produced even when export is blocked.
    pub json: String,
    pub validation: ExportValidation,
    pub report: CleaningReport,
}

/// Summary counts over a cleaned document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportStatistics {
    pub location_count: usize,
    pub measurement_point_count: usize,
    pub locations_by_station_type: BTreeMap<String, usize>,
    pub points_by_station_type: BTreeMap<String, usize>,
    /// Share of the required-field checklist that has content, 0 to 100.
    pub completeness_percent: u8,
}

/// Cleans, validates and serializes form documents.
pub struct ExportPipeline {
    engine: Arc<ValidationEngine>,
    options: ExportOptions,
}

impl ExportPipeline {
    pub fn new(engine: Arc<ValidationEngine>, options: ExportOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Run the cleaning steps on a copy of `form`.
    ///
    /// Cleaning an already cleaned document changes nothing and reports
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::InvalidDocument` if `form` is not a JSON object.
    pub fn clean(&self, form: &Value) -> Result<CleanedDocument, ExportError> {
        if !form.is_object() {
            return Err(ExportError::InvalidDocument {
                actual: json_type_name(form).to_string(),
            });
        }

        let mut report = CleaningReport::default();
        let stripped = if self.options.keep_form_fields {
            form.clone()
        } else {
            self.strip_form_fields(form, "", &mut report)
        };
        let laid_out = apply_station_layout(stripped, &mut report);
        let pruned = prune_empty(laid_out, None).unwrap_or_else(|| Value::Object(Map::new()));
        let document = repair_structure(pruned, &mut report);

        Ok(CleanedDocument { document, report })
    }

    /// Clean, validate and serialize `form`.
    ///
    /// Blocking diagnostics produce [`ExportOutcome::Blocked`]; no JSON is
    /// produced in that case.
    ///
    /// # Errors
    ///
    /// Returns `ExportError` only for unexpected failures such as a
    /// non-object form or a serialization failure.
    pub fn export(&self, form: &Value) -> Result<ExportOutcome, ExportError> {
        let CleanedDocument { document, report } = self.clean(form)?;
        let gate = self.engine.validate_for_export(&document);
        let warnings = merge_warnings(&report, gate.warnings);

        if !gate.can_export {
            tracing::info!(
                errors = gate.blocking_errors.len(),
                warnings = warnings.len(),
                "export blocked"
            );
            return Ok(ExportOutcome::Blocked(BlockedExport {
                blocking_errors: gate.blocking_errors,
                warnings,
                cleaned: document,
                removed_fields: report.removed_field_paths,
            }));
        }

        let json = self.serialize(&document)?;
        tracing::info!(
            bytes = json.len(),
            removed = report.removed_field_paths.len(),
            "export ready"
        );
        Ok(ExportOutcome::Exported(ExportedDocument {
            json,
            document,
            warnings,
            removed_fields: report.removed_field_paths,
            filename: self.options.filename.clone(),
        }))
    }

    /// Clean, validate and serialize without blocking.
    ///
    /// # Errors
    ///
    /// Same as [`Self::export`].
    pub fn preview(&self, form: &Value) -> Result<ExportPreview, ExportError> {
        let CleanedDocument { document, report } = self.clean(form)?;
        let validation = self.engine.validate_for_export(&document);
        let json = self.serialize(&document)?;
        Ok(ExportPreview {
            json,
            validation,
            report,
        })
    }

    /// Count locations and points of the cleaned document by station type.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::InvalidDocument` if `form` is not a JSON object.
    pub fn statistics(&self, form: &Value) -> Result<ExportStatistics, ExportError> {
        let CleanedDocument { document, .. } = self.clean(form)?;
        Ok(statistics_of(&document))
    }

    fn serialize(&self, document: &Value) -> Result<String, ExportError> {
        if self.options.pretty {
            serde_json::to_string_pretty(document)
        } else {
            serde_json::to_string(document)
        }
        .map_err(|source| ExportError::Serialize { source })
    }

    fn strip_form_fields(&self, value: &Value, path: &str, report: &mut CleaningReport) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let child_path = join_key(path, key);
                    if self.options.is_form_only(key) {
                        report.removed(child_path);
                        continue;
                    }
                    out.insert(
                        key.clone(),
                        self.strip_form_fields(child, &child_path, report),
                    );
                }
                Value::Object(out)
            }
            Value::Array(arr) => Value::Array(
                arr.iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.strip_form_fields(item, &format!("{}[{}]", path, i), report)
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn merge_warnings(report: &CleaningReport, gate: Vec<ValidationWarning>) -> Vec<ValidationWarning> {
    let mut warnings: Vec<ValidationWarning> = report
        .warnings
        .iter()
        .map(|w| ValidationWarning::notice(w.as_str()))
        .collect();
    warnings.extend(gate);
    warnings
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn apply_station_layout(mut document: Value, report: &mut CleaningReport) -> Value {
    if let Some(locations) = document
        .get_mut("measurement_location")
        .and_then(Value::as_array_mut)
    {
        for (i, location) in locations.iter_mut().enumerate() {
            if let Value::Object(map) = location {
                layout_location(map, &format!("measurement_location[{}]", i), report);
            }
        }
    }
    document
}

/// Keep only the device properties that match the station type and hand
/// each measurement point the pool sensors it references.
fn layout_location(location: &mut Map<String, Value>, prefix: &str, report: &mut CleaningReport) {
    let station = location
        .get(STATION_TYPE_FIELD)
        .and_then(Value::as_str)
        .map(StationType::parse);

    let misplaced: &[&str] = match &station {
        Some(StationType::Mast) => &[PROFILER_PROPERTIES],
        Some(s) if s.is_vertical_profiler() => &[MAST_PROPERTIES],
        Some(s) if s.is_modelled() => &[MAST_PROPERTIES, PROFILER_PROPERTIES],
        _ => &[],
    };
    for key in misplaced {
        if location.remove(*key).is_some() {
            report.removed(format!("{}.{}", prefix, key));
        }
    }

    let pool = match location.remove(SENSOR_POOL_FIELD) {
        Some(pool) => {
            report.removed(format!("{}.{}", prefix, SENSOR_POOL_FIELD));
            match pool {
                Value::Array(sensors) => sensors,
                _ => Vec::new(),
            }
        }
        None => Vec::new(),
    };
    let by_serial: HashMap<&str, &Value> = pool
        .iter()
        .filter_map(|s| {
            s.get("serial_number")
                .and_then(Value::as_str)
                .map(|serial| (serial, s))
        })
        .collect();

    let Some(points) = location
        .get_mut("measurement_point")
        .and_then(Value::as_array_mut)
    else {
        return;
    };
    for (j, point) in points.iter_mut().enumerate() {
        let point_path = format!("{}.measurement_point[{}]", prefix, j);
        if let Some(sensors) = point.get_mut("sensor").and_then(Value::as_array_mut) {
            for entry in sensors.iter_mut() {
                *entry = resolve_sensor(entry, &by_serial, &point_path, report);
            }
        }
    }
}

/// Replace a sensor reference with the pool sensor of the same serial
/// number. Fields with content on the reference win over pool fields.
fn resolve_sensor(
    entry: &Value,
    pool: &HashMap<&str, &Value>,
    point_path: &str,
    report: &mut CleaningReport,
) -> Value {
    let serial = match entry {
        Value::String(s) => s.as_str(),
        Value::Object(map) => match map.get("serial_number").and_then(Value::as_str) {
            Some(s) => s,
            None => return entry.clone(),
        },
        _ => return entry.clone(),
    };

    match (pool.get(serial), entry) {
        (Some(pooled), Value::Object(overrides)) => {
            let mut merged = (*pooled).clone();
            if let Value::Object(base) = &mut merged {
                for (key, value) in overrides {
                    if has_content(value) {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
            merged
        }
        (Some(pooled), _) => (*pooled).clone(),
        (None, Value::String(_)) => {
            report.warn(format!(
                "Sensor '{}' referenced by {} is not defined at its location",
                serial, point_path
            ));
            let mut stub = Map::new();
            stub.insert("serial_number".to_string(), Value::String(serial.to_string()));
            Value::Object(stub)
        }
        (None, _) => entry.clone(),
    }
}

/// Post-order removal of nulls, blank strings and empty containers.
///
/// `key` is the name the value is stored under; empty structural arrays
/// survive so repair never has to re-add them.
fn prune_empty(value: Value, key: Option<&str>) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Array(items) => {
            let items: Vec<Value> = items
                .into_iter()
                .filter_map(|item| prune_empty(item, None))
                .collect();
            let structural = key.is_some_and(|k| STRUCTURAL_ARRAYS.contains(&k));
            if items.is_empty() && !structural {
                None
            } else {
                Some(Value::Array(items))
            }
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune_empty(v, Some(k.as_str())).map(|v| (k, v)))
                .collect();
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
        other => Some(other),
    }
}

fn repair_structure(mut document: Value, report: &mut CleaningReport) -> Value {
    let Value::Object(root) = &mut document else {
        return document;
    };

    if !root.contains_key("measurement_location") {
        root.insert("measurement_location".to_string(), Value::Array(Vec::new()));
        report.warn("Added missing measurement_location array".to_string());
    }

    if let Some(Value::Array(locations)) = root.get_mut("measurement_location") {
        for (i, location) in locations.iter_mut().enumerate() {
            if let Value::Object(map) = location {
                if !map.contains_key("measurement_point") {
                    map.insert("measurement_point".to_string(), Value::Array(Vec::new()));
                    report.warn(format!(
                        "Added missing measurement_point array to measurement_location[{}]",
                        i
                    ));
                }
            }
        }
    }

    document
}

fn statistics_of(document: &Value) -> ExportStatistics {
    let mut stats = ExportStatistics {
        location_count: 0,
        measurement_point_count: 0,
        locations_by_station_type: BTreeMap::new(),
        points_by_station_type: BTreeMap::new(),
        completeness_percent: 0,
    };

    let locations = document
        .get("measurement_location")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for location in locations {
        let station = StationType::of_location(location)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let points = location
            .get("measurement_point")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        stats.location_count += 1;
        stats.measurement_point_count += points;
        *stats
            .locations_by_station_type
            .entry(station.clone())
            .or_default() += 1;
        *stats.points_by_station_type.entry(station).or_default() += points;
    }

    let filled = REQUIRED_CHECKLIST
        .iter()
        .filter(|field| document.get(**field).is_some_and(has_content))
        .count();
    let total = REQUIRED_CHECKLIST.len();
    stats.completeness_percent = ((filled * 100 + total / 2) / total) as u8;

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> CleaningReport {
        CleaningReport::default()
    }

    #[test]
    fn prune_is_post_order() {
        let pruned = prune_empty(
            json!({
                "a": { "b": { "c": null, "d": "  " } },
                "e": [null, {}, []],
                "f": 0,
                "g": false
            }),
            None,
        );
        assert_eq!(pruned, Some(json!({ "f": 0, "g": false })));
    }

    #[test]
    fn prune_keeps_structural_arrays() {
        let pruned = prune_empty(
            json!({
                "measurement_location": [{ "name": "M1", "measurement_point": [] }],
                "other": []
            }),
            None,
        );
        assert_eq!(
            pruned,
            Some(json!({
                "measurement_location": [{ "name": "M1", "measurement_point": [] }]
            }))
        );
    }

    #[test]
    fn repair_adds_missing_arrays() {
        let mut report = report();
        let repaired = repair_structure(json!({ "author": "A" }), &mut report);
        assert_eq!(repaired["measurement_location"], json!([]));
        assert_eq!(report.warnings.len(), 1);

        let mut report = CleaningReport::default();
        let repaired = repair_structure(
            json!({ "measurement_location": [{ "name": "M1" }] }),
            &mut report,
        );
        assert_eq!(repaired["measurement_location"][0]["measurement_point"], json!([]));
        assert_eq!(
            report.warnings,
            vec!["Added missing measurement_point array to measurement_location[0]".to_string()]
        );
    }

    #[test]
    fn repair_leaves_non_array_locations_for_validation() {
        let mut report = report();
        let repaired = repair_structure(json!({ "measurement_location": "x" }), &mut report);
        assert_eq!(repaired["measurement_location"], "x");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn layout_drops_profiler_properties_for_mast() {
        let mut report = report();
        let doc = apply_station_layout(
            json!({
                "measurement_location": [{
                    "measurement_station_type_id": "mast",
                    "mast_properties": { "mast_height_m": 80 },
                    "vertical_profiler_properties": [{ "date_from": "2020-01-01T00:00:00Z" }]
                }]
            }),
            &mut report,
        );
        let location = &doc["measurement_location"][0];
        assert!(location.get("mast_properties").is_some());
        assert!(location.get("vertical_profiler_properties").is_none());
        assert_eq!(
            report.removed_field_paths,
            vec!["measurement_location[0].vertical_profiler_properties".to_string()]
        );
    }

    #[test]
    fn layout_drops_both_for_reanalysis() {
        let mut report = report();
        let doc = apply_station_layout(
            json!({
                "measurement_location": [{
                    "measurement_station_type_id": "reanalysis",
                    "mast_properties": {},
                    "vertical_profiler_properties": []
                }]
            }),
            &mut report,
        );
        let location = doc["measurement_location"][0].as_object().unwrap();
        assert_eq!(location.len(), 1);
        assert_eq!(report.removed_field_paths.len(), 2);
    }

    #[test]
    fn layout_leaves_unknown_station_untouched() {
        let mut report = report();
        let input = json!({
            "measurement_location": [{
                "measurement_station_type_id": "solar",
                "mast_properties": { "mast_height_m": 10 }
            }]
        });
        let doc = apply_station_layout(input.clone(), &mut report);
        assert_eq!(doc, input);
        assert!(report.removed_field_paths.is_empty());
    }

    #[test]
    fn sensors_resolve_by_serial_number() {
        let mut report = report();
        let doc = apply_station_layout(
            json!({
                "measurement_location": [{
                    "sensors": [
                        { "serial_number": "S1", "oem": "Thies", "model": "First Class" },
                        { "serial_number": "S2", "oem": "Vaisala", "model": "WAA252" }
                    ],
                    "measurement_point": [
                        { "name": "WS80", "sensor": ["S2"] },
                        { "name": "WS60", "sensor": [{ "serial_number": "S1", "model": "Advanced", "notes": "" }] }
                    ]
                }]
            }),
            &mut report,
        );
        let location = &doc["measurement_location"][0];
        assert!(location.get("sensors").is_none());
        assert_eq!(
            location["measurement_point"][0]["sensor"],
            json!([{ "serial_number": "S2", "oem": "Vaisala", "model": "WAA252" }])
        );
        assert_eq!(
            location["measurement_point"][1]["sensor"],
            json!([{ "serial_number": "S1", "oem": "Thies", "model": "Advanced" }])
        );
        assert_eq!(
            report.removed_field_paths,
            vec!["measurement_location[0].sensors".to_string()]
        );
    }

    #[test]
    fn unknown_sensor_reference_warns() {
        let mut report = report();
        let doc = apply_station_layout(
            json!({
                "measurement_location": [{
                    "measurement_point": [{ "name": "WS80", "sensor": ["S9"] }]
                }]
            }),
            &mut report,
        );
        assert_eq!(
            doc["measurement_location"][0]["measurement_point"][0]["sensor"],
            json!([{ "serial_number": "S9" }])
        );
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("S9"));
    }

    #[test]
    fn statistics_group_by_station_type() {
        let stats = statistics_of(&json!({
            "author": "A",
            "organisation": "O",
            "date": "2024-01-01",
            "version": "1.0",
            "measurement_location": [
                { "measurement_station_type_id": "mast", "measurement_point": [{}, {}] },
                { "measurement_station_type_id": "mast", "measurement_point": [{}] },
                { "measurement_station_type_id": "lidar", "measurement_point": [] },
                { "measurement_point": [{}] }
            ]
        }));
        assert_eq!(stats.location_count, 4);
        assert_eq!(stats.measurement_point_count, 4);
        assert_eq!(stats.locations_by_station_type["mast"], 2);
        assert_eq!(stats.points_by_station_type["mast"], 3);
        assert_eq!(stats.points_by_station_type["lidar"], 0);
        assert_eq!(stats.locations_by_station_type["unknown"], 1);
        // 5 of 8 checklist fields
        assert_eq!(stats.completeness_percent, 63);
    }

    #[test]
    fn statistics_of_empty_document() {
        let stats = statistics_of(&json!({}));
        assert_eq!(stats.location_count, 0);
        assert_eq!(stats.completeness_percent, 0);
    }

    #[test]
    fn export_file_save_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = ExportFile {
            filename: "out.json".into(),
            mime_type: EXPORT_MIME_TYPE,
            contents: "{}".into(),
        };
        let path = file.save_in(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
    }
}
