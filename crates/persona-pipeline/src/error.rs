//! Custom error types for the enrichment pipeline.
//!
//! This module provides the error hierarchy using `thiserror` for better
//! error handling and context throughout the pipeline.
//!
//! Errors are serializable as `{code, message}` so the JSON output mode of
//! the CLI (and any other machine consumer) can handle them structurally.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the enrichment pipeline.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    /// Run was cancelled by the driver.
    #[error("Run cancelled")]
    Cancelled,

    /// Bad run preconditions (empty row set, empty credential).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Column mapping referenced a column that does not exist.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// AI provider failure (network, auth, quota, blocked response).
    /// Row-scoped: absorbed into an error marker, never aborts a batch.
    #[error("AI provider error: {0}")]
    Provider(String),

    /// Internal error (e.g., worker thread join failure).
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

    /// HTTP request error (for the provider client, only with "ai" feature).
    #[cfg(feature = "ai")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EnrichmentError>,
    },
}

impl EnrichmentError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EnrichmentError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for machine-readable handling.
    ///
    /// These codes let consumers of the JSON output distinguish specific
    /// error types (e.g., treating cancellation differently from failure).
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation, looking through
    /// any context wrapping.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error is row-scoped: recorded as a per-row error
    /// marker instead of aborting the whole batch.
    pub fn is_row_scoped(&self) -> bool {
        match self {
            Self::Provider(_) => true,
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => true,
            Self::WithContext { source, .. } => source.is_row_scoped(),
            _ => false,
        }
    }
}

/// Serialize implementation for machine consumers.
///
/// Errors are serialized as a struct with `code` and `message` fields,
/// making them easy to handle in downstream tooling.
impl Serialize for EnrichmentError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EnrichmentError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for enrichment operations.
pub type Result<T> = std::result::Result<T, EnrichmentError>;

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
        self.map_err(|e| EnrichmentError::Polars(e).with_context(context))
    }
}
