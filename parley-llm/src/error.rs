//! Provider error types.

use thiserror::Error;

/// Errors that can occur while talking to a chat backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The adapter is missing credentials, an endpoint or a model.
    #[error("Provider configuration error: {0}")]
    Config(String),

    /// HTTP request failed before a response arrived.
    #[error("Chat request failed: {0}")]
    RequestFailed(String),

    /// Backend answered with a non-success status.
    #[error("Backend returned HTTP {status}: {body}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Backend response did not have the expected shape.
    #[error("Failed to parse backend response: {0}")]
    ParseError(String),

    /// Request timed out.
    #[error("Chat request timed out after {0}ms")]
    Timeout(u64),

    /// The backend cannot be reached, or the adapter is not initialized.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// No adapter is active; nothing was sent.
    #[error("No chat provider is active")]
    NoProvider,

    /// All retry attempts exhausted.
    #[error("All retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: String,
    },

    /// Backend reported an error inside a 2xx body.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl LlmError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_) | Self::HttpStatus { .. } | Self::Timeout(_) | Self::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else if err.is_decode() {
            LlmError::ParseError(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}
