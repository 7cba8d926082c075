//! Error types for the world integration layer.

use parley_core::types::AgentId;
use thiserror::Error;

use crate::events::StoryEvent;

/// Why a webhook was not delivered.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhooks are switched off in configuration.
    #[error("webhooks are disabled")]
    Disabled,

    /// No URL is configured for this event.
    #[error("no webhook destination configured for {0}")]
    NoDestination(StoryEvent),

    /// The receiver answered with a non-success status.
    #[error("webhook receiver returned HTTP {status}")]
    HttpStatus {
        /// Status code returned.
        status: u16,
    },

    /// The request did not complete within the configured timeout.
    #[error("webhook request timed out after {0}ms")]
    Timeout(u64),

    /// Connection or protocol failure.
    #[error("webhook transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Why a chat message was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The agent is not registered (or was removed).
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    /// The agent is already answering someone.
    #[error("[{name} is still thinking...]")]
    StillThinking {
        /// Agent display name.
        name: String,
    },

    /// The player spoke to this agent too recently.
    #[error("please wait {}ms before speaking again", .retry_after.num_milliseconds())]
    RateLimited {
        /// Time left until the player may speak again.
        retry_after: chrono::Duration,
    },
}

impl Rejection {
    /// Text to show the player, if any. Rate limiting is silent.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::StillThinking { .. } => Some(self.to_string()),
            Self::UnknownAgent(_) | Self::RateLimited { .. } => None,
        }
    }
}
