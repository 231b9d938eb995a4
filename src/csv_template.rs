//! Example CSV data templates built from the schema's enumerations.
//!
//! Columns are named `<MeasurementType>_<height>m_<Statistic>`, e.g.
//! `WindSpeed_80m_Avg`. Measurements without a positive height drop the
//! height part: `WaveHeight_Avg`.

use std::sync::Arc;

use serde_json::Value;

use crate::accessor::SchemaAccessor;
use crate::error::TemplateError;

const MEASUREMENT_TYPE_PATH: &str =
    "measurement_location.items.properties.measurement_point.items.properties.measurement_type_id";
const STATISTIC_TYPE_PATH: &str = "measurement_location.items.properties.measurement_point.items.properties.logger_measurement_config.items.properties.column_name.items.properties.statistic_type_id";
const HEIGHT_REFERENCE_PATH: &str =
    "measurement_location.items.properties.measurement_point.items.properties.height_reference_id";

const EXAMPLE_TIMESTAMP: &str = "2024-01-01 00:00:00";

/// One planned data column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub measurement_type: String,
    pub height_m: f64,
    pub statistic: String,
}

impl ColumnSpec {
    pub fn new(
        measurement_type: impl Into<String>,
        height_m: f64,
        statistic: impl Into<String>,
    ) -> Self {
        Self {
            measurement_type: measurement_type.into(),
            height_m,
            statistic: statistic.into(),
        }
    }

    pub fn column_name(&self) -> String {
        let measurement = pascal_case(&self.measurement_type);
        let statistic = pascal_case(&self.statistic);
        if self.height_m > 0.0 {
            format!("{}_{}m_{}", measurement, format_height(self.height_m), statistic)
        } else {
            format!("{}_{}", measurement, statistic)
        }
    }
}

/// Options for template rendering.
#[derive(Debug, Clone)]
pub struct CsvTemplateOptions {
    /// Prefix the template with `#` comment lines describing the format.
    pub include_instructions: bool,
    pub timestamp_header: String,
    pub columns: Vec<ColumnSpec>,
}

impl Default for CsvTemplateOptions {
    fn default() -> Self {
        Self {
            include_instructions: true,
            timestamp_header: "Timestamp".to_string(),
            columns: default_columns(),
        }
    }
}

impl CsvTemplateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_instructions(mut self, include: bool) -> Self {
        self.include_instructions = include;
        self
    }

    pub fn timestamp_header(mut self, header: impl Into<String>) -> Self {
        self.timestamp_header = header.into();
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }
}

/// A typical met mast plus one surface measurement.
fn default_columns() -> Vec<ColumnSpec> {
    let mut columns = Vec::new();
    for statistic in ["avg", "sd", "min", "max"] {
        columns.push(ColumnSpec::new("wind_speed", 100.0, statistic));
    }
    for statistic in ["avg", "sd"] {
        columns.push(ColumnSpec::new("wind_speed", 80.0, statistic));
    }
    columns.push(ColumnSpec::new("wind_direction", 98.0, "avg"));
    columns.push(ColumnSpec::new("air_temperature", 2.0, "avg"));
    columns.push(ColumnSpec::new("air_pressure", 2.0, "avg"));
    columns.push(ColumnSpec::new("relative_humidity", 2.0, "avg"));
    columns.push(ColumnSpec::new("wave_height", 0.0, "avg"));
    columns
}

/// Builds CSV templates from the schema accessor's enum data.
pub struct CsvTemplateGenerator {
    accessor: Arc<SchemaAccessor>,
}

impl CsvTemplateGenerator {
    pub fn new(accessor: Arc<SchemaAccessor>) -> Self {
        Self { accessor }
    }

    pub fn measurement_types(&self) -> Vec<String> {
        self.enum_strings(MEASUREMENT_TYPE_PATH)
    }

    pub fn statistic_types(&self) -> Vec<String> {
        self.enum_strings(STATISTIC_TYPE_PATH)
    }

    pub fn height_references(&self) -> Vec<String> {
        self.enum_strings(HEIGHT_REFERENCE_PATH)
    }

    /// Planned columns whose measurement type and statistic the schema allows.
    ///
    /// A schema without the enumeration does not constrain that part.
    pub fn columns(&self, options: &CsvTemplateOptions) -> Vec<ColumnSpec> {
        let measurements = self.measurement_types();
        let statistics = self.statistic_types();
        let allowed =
            |list: &[String], value: &str| list.is_empty() || list.iter().any(|v| v == value);

        options
            .columns
            .iter()
            .filter(|c| {
                allowed(&measurements, &c.measurement_type) && allowed(&statistics, &c.statistic)
            })
            .cloned()
            .collect()
    }

    /// Header line cells: timestamp first, then one per column.
    pub fn header(&self, options: &CsvTemplateOptions) -> Vec<String> {
        std::iter::once(options.timestamp_header.clone())
            .chain(self.columns(options).iter().map(ColumnSpec::column_name))
            .collect()
    }

    /// Render the template text.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if the CSV writer fails.
    pub fn render(&self, options: &CsvTemplateOptions) -> Result<String, TemplateError> {
        let columns = self.columns(options);

        let mut text = String::new();
        if options.include_instructions {
            for line in self.instructions() {
                text.push_str("# ");
                text.push_str(&line);
                text.push('\n');
            }
        }

        let header = self.header(options);
        let row: Vec<String> = std::iter::once(EXAMPLE_TIMESTAMP.to_string())
            .chain(columns.iter().map(example_value))
            .collect();

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(&header)?;
        writer.write_record(&row)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        text.push_str(&String::from_utf8(bytes)?);

        tracing::debug!(columns = columns.len(), "rendered CSV template");
        Ok(text)
    }

    fn instructions(&self) -> Vec<String> {
        let mut lines = vec![
            "IEA Task 43 WRA measurement data template".to_string(),
            "Column naming: <MeasurementType>_<Height>m_<Statistic>, height omitted for surface measurements".to_string(),
            "Timestamp format: YYYY-MM-DD HH:MM:SS".to_string(),
        ];
        let listed = [
            ("Measurement types", self.measurement_types()),
            ("Statistics", self.statistic_types()),
            ("Height references", self.height_references()),
        ];
        for (title, values) in listed {
            if !values.is_empty() {
                lines.push(format!("{}: {}", title, values.join(", ")));
            }
        }
        lines
    }

    fn enum_strings(&self, path: &str) -> Vec<String> {
        self.accessor
            .enum_values(path)
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect()
    }
}

fn pascal_case(id: &str) -> String {
    id.split(|c| c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn format_height(height_m: f64) -> String {
    if height_m.fract() == 0.0 {
        format!("{}", height_m as i64)
    } else {
        format!("{}", height_m)
    }
}

fn example_value(column: &ColumnSpec) -> String {
    let base = match column.measurement_type.as_str() {
        "wind_speed" => 7.52,
        "wind_direction" => 182.4,
        "vertical_wind_speed" => 0.12,
        "air_temperature" => 12.3,
        "air_pressure" => 1013.2,
        "relative_humidity" => 78.5,
        "global_horizontal_irradiance" => 245.0,
        "wave_height" => 1.4,
        "wave_period" => 6.2,
        "water_temperature" => 10.8,
        "voltage" => 12.6,
        _ => 0.0,
    };
    match column.statistic.as_str() {
        "sd" => format!("{:.2}", base * 0.15),
        "min" => format!("{:.2}", base * 0.6),
        "max" | "gust" => format!("{:.2}", base * 1.4),
        "ti" => "0.12".to_string(),
        "count" => "600".to_string(),
        _ => format!("{:.2}", base),
    }
}
