//! Long-lived services, built once and shared by reference.

use std::sync::Arc;

use serde_json::Value;

use crate::accessor::SchemaAccessor;
use crate::csv_template::CsvTemplateGenerator;
use crate::engine::ValidationEngine;
use crate::error::{CompileError, LoadError};
use crate::export::ExportPipeline;
use crate::loader::bundled_schema;
use crate::types::{ExportOptions, ValidatorOptions};
use crate::validator::ValidatorCache;

/// Errors while assembling a [`WraToolkit`].
#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// One instance of every service, wired to a single schema document.
///
/// Construct it once at startup and pass it (or the individual `Arc`s) to
/// whatever needs validation or export.
pub struct WraToolkit {
    accessor: Arc<SchemaAccessor>,
    validators: Arc<ValidatorCache>,
    engine: Arc<ValidationEngine>,
    exporter: Arc<ExportPipeline>,
    templates: Arc<CsvTemplateGenerator>,
}

impl WraToolkit {
    /// Toolkit over the bundled IEA Task 43 schema with default options.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError` if the bundled schema fails to parse or compile.
    pub fn bundled() -> Result<Self, ToolkitError> {
        Ok(Self::from_schema(
            bundled_schema()?,
            ValidatorOptions::default(),
            ExportOptions::default(),
        )?)
    }

    /// Toolkit over a caller-supplied schema document.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if the document validator cannot be compiled.
    pub fn from_schema(
        schema: Value,
        validator_options: ValidatorOptions,
        export_options: ExportOptions,
    ) -> Result<Self, CompileError> {
        let accessor = Arc::new(SchemaAccessor::new(schema));
        let validators = Arc::new(ValidatorCache::new(Arc::clone(&accessor), validator_options)?);
        let engine = Arc::new(ValidationEngine::new(Arc::clone(&validators)));
        let exporter = Arc::new(ExportPipeline::new(Arc::clone(&engine), export_options));
        let templates = Arc::new(CsvTemplateGenerator::new(Arc::clone(&accessor)));
        tracing::debug!("toolkit ready");

        Ok(Self {
            accessor,
            validators,
            engine,
            exporter,
            templates,
        })
    }

    pub fn accessor(&self) -> &Arc<SchemaAccessor> {
        &self.accessor
    }

    pub fn validators(&self) -> &Arc<ValidatorCache> {
        &self.validators
    }

    pub fn engine(&self) -> &Arc<ValidationEngine> {
        &self.engine
    }

    pub fn exporter(&self) -> &Arc<ExportPipeline> {
        &self.exporter
    }

    pub fn templates(&self) -> &Arc<CsvTemplateGenerator> {
        &self.templates
    }
}
