//! Error types for the task export pipeline.
//!
//! Structural problems (missing columns, empty input) and I/O failures are
//! fatal and surface as [`PlannerError`]. Parse anomalies and rule violations
//! are never errors: they are accumulated into statistics and validation
//! results instead.
//!
//! Errors are serializable so they can be embedded in JSON run reports.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// One or more required columns are absent after the rename step.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The input dataset has no rows.
    #[error("Input dataset is empty")]
    EmptyDataset,

    /// An explicitly requested input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Directory scan found no file matching the configured patterns.
    #[error("No input file matching {patterns:?} found in {}", dir.display())]
    NoInputFile { dir: PathBuf, patterns: Vec<String> },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal invariant broken.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PlannerError>,
    },
}

impl PlannerError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PlannerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine-readable reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::InputNotFound(_) => "INPUT_NOT_FOUND",
            Self::NoInputFile { .. } => "NO_INPUT_FILE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error rejects the dataset shape itself, before any
    /// transformation ran.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::MissingColumns(_) | Self::EmptyDataset => true,
            Self::WithContext { source, .. } => source.is_structural(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PlannerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PlannerError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PlannerError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PlannerError::Io(e).with_context(context))
    }
}
