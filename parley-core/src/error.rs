//! Error types for the Parley core library.

use thiserror::Error;

/// Top-level error type for core Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Configuration could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A persisted conversation record was malformed.
    #[error("Invalid conversation record {path}: {reason}")]
    InvalidRecord {
        /// File the record was read from.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ParleyError>;
