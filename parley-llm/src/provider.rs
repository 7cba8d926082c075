//! The contract every chat backend implements.

use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::ProviderKind;
use parley_core::types::ChatMessage;

use crate::error::LlmError;

/// A text-generation backend that can hold a conversation.
///
/// Adapters start unavailable. `initialize` validates configuration and
/// performs one real round trip; only then does `is_available` report true.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Which backend family this adapter speaks.
    fn kind(&self) -> ProviderKind;

    /// Name for logs, e.g. `Ollama (mistral:7b-instruct)`.
    fn name(&self) -> &str;

    /// Validate configuration and check the backend is reachable.
    ///
    /// # Errors
    /// `LlmError::Config` when credentials or settings are missing (no
    /// network call is made), otherwise the error from the reachability check.
    async fn initialize(&self) -> Result<(), LlmError>;

    /// Generate the next assistant message.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status or a
    /// malformed response.
    async fn chat(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Longest a whole `chat` call may take, retries included.
    /// `None` leaves the deadline to the caller.
    fn dispatch_timeout(&self) -> Option<Duration> {
        None
    }

    /// Whether the adapter initialized and has not been shut down.
    fn is_available(&self) -> bool;

    /// Release the adapter; it reports unavailable afterwards.
    fn shutdown(&self);
}
