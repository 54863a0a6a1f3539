//! Error types for beakers-triage
//!
//! Per-article failures (unparsable output, failed calls) are recorded on the
//! triage result and do not surface here. `TriageError` is for failures that
//! abort an operation: storage, configuration, bad input.

use crate::services::inference::InferenceError;
use crate::services::response_parser::ParseError;
use thiserror::Error;

/// Triage operation error
#[derive(Debug, Error)]
pub enum TriageError {
    /// beakers-common error (database init, config)
    #[error("Common error: {0}")]
    Common(#[from] beakers_common::Error),

    /// Query failure outside the common layer
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Inference endpoint failure
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    /// Model output could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// JSON (de)serialization of stored columns or cache entries
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid caller input (candidate file, CLI argument)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored row violates an invariant the code relies on
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

/// Result type for triage operations
pub type Result<T> = std::result::Result<T, TriageError>;
