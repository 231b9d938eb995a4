//! Error types for WRA schema loading, validator compilation and export.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading the schema document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns true when the failure came from reading the source rather than parsing it.
    pub fn is_io(&self) -> bool {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => true,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => true,
            LoadError::InvalidJson { .. } => false,
        }
    }
}

/// A schema fragment could not be compiled into a validator.
#[derive(Debug, Clone, Error)]
#[error("cannot compile validator for '{path}': {message}")]
pub struct CompileError {
    /// Schema path of the fragment, empty for the whole document.
    pub path: String,
    pub message: String,
}

/// Unexpected failures inside the export pipeline.
///
/// Validation problems are never reported here; they travel as data in
/// [`crate::ExportOutcome::Blocked`].
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("form document must be a JSON object, got {actual}")]
    InvalidDocument { actual: String },

    #[error("cannot serialize export document: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Errors while rendering a CSV template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot write CSV template: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV template is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
