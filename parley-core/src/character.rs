//! Character sheets: who an agent is and how it reacts to the outside world.
//!
//! Sheets deserialize from JSON with snake_case keys; every section has a
//! default so hand-written files can be sparse.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Complete description of a conversational agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterSheet {
    /// Stable character identifier (reported in webhooks).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Epithet, e.g. "The Wandering Sage".
    pub title: String,
    /// Traits, history and drives.
    pub personality: Personality,
    /// Goals the agent pursues without saying so.
    pub hidden_agenda: HiddenAgenda,
    /// Greeting/farewell manner and idle flavour.
    pub behavior: Behavior,
    /// Vocabulary and phrasing.
    pub speech_style: SpeechStyle,
    /// Reactions to external events, keyed by event kind (e.g. `signal_on`).
    pub external_triggers: HashMap<String, ExternalTrigger>,
    /// Output signals to emit on story events, keyed by event (e.g. `quest_started`).
    pub story_triggers: HashMap<String, StoryTrigger>,
}

/// Personality section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    /// Adjectives describing the character.
    pub traits: Vec<String>,
    /// Where the character comes from.
    pub backstory: String,
    /// What drives the character.
    pub motivation: String,
    /// What the character is afraid of.
    pub fears: Vec<String>,
    /// Small habits.
    pub quirks: Vec<String>,
}

/// Goals the character keeps to itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenAgenda {
    /// Immediate goal.
    pub short_term_goal: String,
    /// Overarching goal.
    pub long_term_goal: String,
    /// The secret itself.
    pub secret: String,
    /// When hinting at the secret is allowed.
    pub reveal_conditions: Vec<String>,
}

/// Social manner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Behavior {
    /// How the character greets.
    pub greeting_style: String,
    /// How the character says goodbye.
    pub farewell_style: String,
    /// Flavour actions while idle.
    pub idle_actions: Vec<String>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            greeting_style: "friendly".to_string(),
            farewell_style: "warm".to_string(),
            idle_actions: Vec::new(),
        }
    }
}

/// Speech section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechStyle {
    /// Register of the vocabulary.
    pub vocabulary: String,
    /// Typical sentence length.
    pub sentence_length: String,
    /// Phrases the character likes.
    pub common_phrases: Vec<String>,
    /// Phrases the character must never use.
    pub avoid_phrases: Vec<String>,
}

impl Default for SpeechStyle {
    fn default() -> Self {
        Self {
            vocabulary: "normal".to_string(),
            sentence_length: "medium".to_string(),
            common_phrases: Vec::new(),
            avoid_phrases: Vec::new(),
        }
    }
}

/// How the character reacts to one kind of external event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalTrigger {
    /// What to do (currently only `speak`).
    pub action: String,
    /// Announced to nearby players when the event arrives.
    pub message: String,
    /// Mood label to adopt.
    pub mood_shift: String,
    /// Replaces the default context text injected into the next prompt.
    pub inject_context: String,
    /// How much of the secret may be revealed in response.
    pub reveal_level: u8,
}

impl Default for ExternalTrigger {
    fn default() -> Self {
        Self {
            action: "speak".to_string(),
            message: String::new(),
            mood_shift: String::new(),
            inject_context: String::new(),
            reveal_level: 0,
        }
    }
}

/// Output signal emitted when a story event happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryTrigger {
    /// Whether to emit at all.
    pub emit_signal: bool,
    /// Base strength (0..=15).
    pub strength: u8,
    /// Emission length in ticks.
    pub duration_ticks: u32,
    /// Pattern name: `constant`, `fade`, `pulse_3x`, `sos`.
    pub pattern: String,
}

impl Default for StoryTrigger {
    fn default() -> Self {
        Self {
            emit_signal: false,
            strength: 15,
            duration_ticks: 40,
            pattern: "constant".to_string(),
        }
    }
}

impl Default for CharacterSheet {
    fn default() -> Self {
        Self {
            id: "storyteller".to_string(),
            name: "Storyteller".to_string(),
            title: "The Wandering Sage".to_string(),
            personality: Personality::default(),
            hidden_agenda: HiddenAgenda::default(),
            behavior: Behavior::default(),
            speech_style: SpeechStyle::default(),
            external_triggers: HashMap::new(),
            story_triggers: HashMap::new(),
        }
    }
}

impl CharacterSheet {
    /// The stock character used when no sheet is supplied.
    #[must_use]
    pub fn eldric() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        Self {
            id: "eldric".to_string(),
            name: "Eldric".to_string(),
            title: "The Wandering Sage".to_string(),
            personality: Personality {
                traits: strings(&["wise", "mysterious", "patient", "slightly mischievous"]),
                backstory: "An ancient traveler who has wandered between worlds for centuries, \
                            collecting stories and secrets."
                    .to_string(),
                motivation: "To find worthy adventurers and guide them toward their destiny, \
                             while searching for something lost long ago."
                    .to_string(),
                fears: strings(&["being forgotten", "the void between worlds"]),
                quirks: strings(&[
                    "Often speaks in riddles",
                    "Pauses dramatically before revealing important information",
                ]),
            },
            hidden_agenda: HiddenAgenda {
                short_term_goal: "Gain the player's trust through helpful advice".to_string(),
                long_term_goal: "Guide players to find the fragments of an ancient artifact".to_string(),
                secret: "Is bound to this world by a curse and needs the artifact to break free"
                    .to_string(),
                reveal_conditions: strings(&[
                    "After 20+ conversations with the same player",
                    "When the player mentions ancient artifacts",
                ]),
            },
            behavior: Behavior {
                greeting_style: "warm but mysterious".to_string(),
                farewell_style: "cryptic hint about the future".to_string(),
                idle_actions: strings(&["gazes at the horizon thoughtfully"]),
            },
            speech_style: SpeechStyle {
                vocabulary: "archaic, poetic".to_string(),
                sentence_length: "varied, sometimes brief and cryptic, sometimes flowing".to_string(),
                common_phrases: strings(&["Ah, young traveler...", "But that is a tale for another time..."]),
                avoid_phrases: strings(&["As an AI", "I cannot"]),
            },
            external_triggers: HashMap::new(),
            story_triggers: HashMap::new(),
        }
    }

    /// Parse a sheet from JSON.
    ///
    /// # Errors
    /// Returns `ParleyError::Serialization` on malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the sheet to pretty JSON.
    ///
    /// # Errors
    /// Returns `ParleyError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reaction configured for an external event kind.
    #[must_use]
    pub fn external_trigger(&self, kind: &str) -> Option<&ExternalTrigger> {
        self.external_triggers.get(kind)
    }

    /// Emission configured for a story event.
    #[must_use]
    pub fn story_trigger(&self, event: &str) -> Option<&StoryTrigger> {
        self.story_triggers.get(event)
    }
}
