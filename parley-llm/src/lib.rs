//! # parley-llm: chat providers for Parley
//!
//! One contract, [`ChatProvider`], and three adapters:
//!   - **Ollama** (local inference, default)
//!   - **Anthropic** Messages API
//!   - **OpenAI** chat completions
//!
//! The [`ProviderManager`] owns all of them, activates the preferred one
//! and fails over to whichever other adapter initializes first. Every
//! conversational failure degrades to a fixed in-character sentinel string:
//!
//! ```text
//! no active provider      → NO_PROVIDER_RESPONSE   (no network call)
//! backend error / timeout → LOST_IN_THOUGHT_RESPONSE
//! ```

pub mod anthropic;
pub mod error;
mod http;
pub mod manager;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod provider;

pub use error::LlmError;
pub use manager::{ProviderManager, LOST_IN_THOUGHT_RESPONSE, NO_PROVIDER_RESPONSE};
pub use provider::ChatProvider;
