//! Errors shared by the Beakers crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bootstrap TOML or triage settings rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// A write the store refuses: rows for the wrong (period, discipline)
    /// pair, slot counts above quota
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A persisted row that no longer decodes (bad enum text, score out of
    /// range, malformed JSON column)
    #[error("Stored data error: {0}")]
    StoredData(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
