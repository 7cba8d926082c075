//! Per-(agent, player) conversation state.
//!
//! Holds bounded message history, exchange counters and the timestamp of
//! the last interaction used for rate limiting. Lookups on unknown pairs
//! return empty defaults.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConversationConfig;
use crate::types::{AgentId, ChatMessage, PlayerId, Role};

/// Summary returned when a pair has no history yet.
pub const FIRST_CONVERSATION: &str = "This is your first conversation with this player.";

/// Messages included in a history summary.
const SUMMARY_MESSAGES: usize = 6;
/// Characters kept per message in a history summary.
const SUMMARY_CONTENT_CHARS: usize = 100;

/// A message together with the instant it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// The message itself.
    pub message: ChatMessage,
    /// When it was recorded.
    pub at: DateTime<Utc>,
}

/// State of one agent/player pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationRecord {
    /// Chronological messages, oldest first.
    pub messages: VecDeque<StoredMessage>,
    /// Completed request/response pairs.
    pub exchange_count: u32,
    /// Last time a message was recorded for this pair.
    pub last_interaction_at: Option<DateTime<Utc>>,
}

/// Concurrent store of every conversation the process knows about.
#[derive(Debug)]
pub struct ConversationStore {
    records: DashMap<(AgentId, PlayerId), ConversationRecord>,
    max_history: usize,
    min_gap: Duration,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(max_history: usize, min_gap: Duration) -> Self {
        Self {
            records: DashMap::new(),
            max_history: max_history.max(1),
            min_gap,
        }
    }

    /// Create an empty store from configuration.
    #[must_use]
    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.max_history, config.min_message_gap())
    }

    /// Maximum messages kept per pair.
    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Append a message, stamped with the current time.
    pub fn add_message(&self, agent: AgentId, player: PlayerId, message: ChatMessage) {
        self.add_message_at(agent, player, message, Utc::now());
    }

    /// Append a message recorded at `now`, evicting the oldest messages
    /// beyond the history limit.
    pub fn add_message_at(&self, agent: AgentId, player: PlayerId, message: ChatMessage, now: DateTime<Utc>) {
        let mut record = self.records.entry((agent, player)).or_default();
        record.messages.push_back(StoredMessage { message, at: now });
        while record.messages.len() > self.max_history {
            record.messages.pop_front();
        }
        record.last_interaction_at = Some(now);
    }

    /// Messages for a pair in chronological order.
    #[must_use]
    pub fn get_history(&self, agent: AgentId, player: PlayerId) -> Vec<ChatMessage> {
        self.records
            .get(&(agent, player))
            .map(|r| r.messages.iter().map(|m| m.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Stored messages (with timestamps) for a pair.
    #[must_use]
    pub fn stored_history(&self, agent: AgentId, player: PlayerId) -> Vec<StoredMessage> {
        self.records
            .get(&(agent, player))
            .map(|r| r.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop the messages of one pair. Counts and timestamps are kept.
    pub fn clear_history(&self, agent: AgentId, player: PlayerId) {
        if let Some(mut record) = self.records.get_mut(&(agent, player)) {
            record.messages.clear();
        }
    }

    /// Forget everything about an agent: messages, counts and timestamps
    /// for every player.
    pub fn clear_agent_history(&self, agent: AgentId) {
        self.records.retain(|(a, _), _| *a != agent);
        debug!(agent = %agent, "Cleared agent conversation state");
    }

    /// Forget everything.
    pub fn reset(&self) {
        self.records.clear();
    }

    /// Record one completed exchange for a pair.
    pub fn increment_exchange_count(&self, agent: AgentId, player: PlayerId) {
        let mut record = self.records.entry((agent, player)).or_default();
        record.exchange_count = record.exchange_count.saturating_add(1);
    }

    /// Completed exchanges for a pair.
    #[must_use]
    pub fn exchange_count(&self, agent: AgentId, player: PlayerId) -> u32 {
        self.records.get(&(agent, player)).map_or(0, |r| r.exchange_count)
    }

    /// Last recorded interaction for a pair.
    #[must_use]
    pub fn last_interaction(&self, agent: AgentId, player: PlayerId) -> Option<DateTime<Utc>> {
        self.records.get(&(agent, player)).and_then(|r| r.last_interaction_at)
    }

    /// Whether the player may message the agent now.
    #[must_use]
    pub fn can_interact(&self, agent: AgentId, player: PlayerId) -> bool {
        self.can_interact_at(agent, player, Utc::now())
    }

    /// Whether the player may message the agent at `now`.
    #[must_use]
    pub fn can_interact_at(&self, agent: AgentId, player: PlayerId, now: DateTime<Utc>) -> bool {
        match self.last_interaction(agent, player) {
            None => true,
            Some(last) => now - last >= self.min_gap,
        }
    }

    /// Remaining wait before the player may message the agent again.
    #[must_use]
    pub fn time_until_can_interact(&self, agent: AgentId, player: PlayerId) -> Duration {
        self.time_until_can_interact_at(agent, player, Utc::now())
    }

    /// Remaining wait at `now`; zero when interaction is allowed.
    #[must_use]
    pub fn time_until_can_interact_at(&self, agent: AgentId, player: PlayerId, now: DateTime<Utc>) -> Duration {
        match self.last_interaction(agent, player) {
            None => Duration::zero(),
            Some(last) => (self.min_gap - (now - last)).max(Duration::zero()),
        }
    }

    /// Short prose summary of the relationship, for the system prompt.
    #[must_use]
    pub fn build_summary(&self, agent: AgentId, player: PlayerId) -> String {
        let history = self.get_history(agent, player);
        if history.is_empty() {
            return FIRST_CONVERSATION.to_string();
        }

        let count = self.exchange_count(agent, player);
        let mut summary = format!("You have had {count} conversation(s) with this player.\n");
        summary.push_str("Recent exchange:\n");

        let start = history.len().saturating_sub(SUMMARY_MESSAGES);
        for msg in &history[start..] {
            let speaker = if msg.role == Role::User { "Player" } else { "You" };
            summary.push_str("- ");
            summary.push_str(speaker);
            summary.push_str(": ");
            summary.push_str(&truncate_chars(&msg.content, SUMMARY_CONTENT_CHARS));
            summary.push('\n');
        }
        summary
    }

    /// Copy of every non-empty record, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(AgentId, PlayerId, ConversationRecord)> {
        self.records
            .iter()
            .filter(|entry| !entry.value().messages.is_empty())
            .map(|entry| {
                let (agent, player) = *entry.key();
                (agent, player, entry.value().clone())
            })
            .collect()
    }

    /// Replace a pair's messages and count with restored values. The
    /// newest `max_history` messages are kept; rate limiting starts fresh.
    pub fn restore(&self, agent: AgentId, player: PlayerId, messages: Vec<StoredMessage>, exchange_count: u32) {
        let skip = messages.len().saturating_sub(self.max_history);
        let record = ConversationRecord {
            messages: messages.into_iter().skip(skip).collect(),
            exchange_count,
            last_interaction_at: None,
        };
        self.records.insert((agent, player), record);
    }

    /// Number of pairs with any state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no state at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::from_config(&ConversationConfig::default())
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
