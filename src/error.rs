//! Error types for Synheart Insight
//!
//! The analytics engine itself is total: degenerate numeric input resolves to
//! defined fallback values instead of errors. These errors only surface at the
//! edges where JSON payloads or catalog configuration are parsed.

use thiserror::Error;

/// Errors that can occur while decoding inputs or configuration
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse analysis payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid biomarker catalog: {0}")]
    InvalidCatalog(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
