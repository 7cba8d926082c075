//! Events flowing between the physical layer and conversing agents.
//!
//! Two directions:
//!
//! ```text
//! physical world ──ExternalEvent──▶ agent (context for the next prompt)
//! agent ──────────StoryEvent──────▶ physical world (signal emission, webhook)
//! ```

use std::fmt;
use std::str::FromStr;

use parley_core::types::BlockPos;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Kind of stimulus an agent can perceive from outside the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalEventKind {
    /// A nearby signal source switched on.
    SignalOn,
    /// A nearby signal source switched off.
    SignalOff,
    /// A rhythmic signal was observed.
    SignalPulse,
    /// Something called in over HTTP.
    HttpTrigger,
    /// Anything else the host wants to report.
    Custom,
}

impl ExternalEventKind {
    /// Key used in a character sheet's `external_triggers`.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::SignalOn => "signal_on",
            Self::SignalOff => "signal_off",
            Self::SignalPulse => "signal_pulse",
            Self::HttpTrigger => "http_trigger",
            Self::Custom => "custom",
        }
    }

    /// Prompt context used when the character has no override.
    #[must_use]
    pub fn default_context(self) -> &'static str {
        match self {
            Self::SignalOn => {
                "You sense a disturbance - something in the physical world has just activated. \
                 This might be significant to your visitor."
            }
            Self::SignalOff => "The strange energy you felt has subsided.",
            Self::SignalPulse => "You feel a rhythmic pulse of energy from beyond the world.",
            Self::HttpTrigger => "An external force has reached out to you.",
            Self::Custom => "Something unusual has occurred.",
        }
    }
}

impl fmt::Display for ExternalEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A stimulus delivered to one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEvent {
    /// What happened.
    pub kind: ExternalEventKind,
    /// Where, if it has a location.
    pub position: Option<BlockPos>,
    /// Raw signal strength, for signal events.
    pub strength: Option<u8>,
}

impl ExternalEvent {
    /// An event without location or strength.
    #[must_use]
    pub fn new(kind: ExternalEventKind) -> Self {
        Self {
            kind,
            position: None,
            strength: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Story beats an agent can announce to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryEvent {
    /// A player started talking to the agent.
    ConversationStarted,
    /// The agent let part of its secret slip.
    SecretRevealed,
    /// The agent handed out a quest.
    QuestStarted,
    /// A quest was completed.
    QuestCompleted,
    /// The agent's mood changed.
    MoodChanged,
    /// The agent warned of danger.
    DangerWarning,
}

impl StoryEvent {
    /// Every story event.
    pub const ALL: [Self; 6] = [
        Self::ConversationStarted,
        Self::SecretRevealed,
        Self::QuestStarted,
        Self::QuestCompleted,
        Self::MoodChanged,
        Self::DangerWarning,
    ];

    /// Lowercase wire name; also the key in a sheet's `story_triggers`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConversationStarted => "conversation_started",
            Self::SecretRevealed => "secret_revealed",
            Self::QuestStarted => "quest_started",
            Self::QuestCompleted => "quest_completed",
            Self::MoodChanged => "mood_changed",
            Self::DangerWarning => "danger_warning",
        }
    }
}

impl fmt::Display for StoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == wanted)
            .ok_or_else(|| format!("unknown story event: {s}"))
    }
}
