//! On-disk conversation archive.
//!
//! One pretty-printed JSON record per agent/player pair, named
//! `<agent>_<player>.json`:
//!
//! ```json
//! {
//!   "npcId": "…",
//!   "playerId": "…",
//!   "messages": [{ "role": "user", "content": "…", "timestamp": 1718000000000 }],
//!   "conversationCount": 3
//! }
//! ```
//!
//! Saving and loading are best-effort per record: a record that cannot be
//! written or parsed is logged and skipped, the rest of the pass continues.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::conversation::{ConversationStore, StoredMessage};
use crate::error::{ParleyError, Result};
use crate::types::{AgentId, ChatMessage, PlayerId, Role};

// ---------------------------------------------------------------------------
// Record format
// ---------------------------------------------------------------------------

/// Serialized form of one pair's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedConversation {
    /// Agent identifier.
    pub npc_id: String,
    /// Player identifier.
    pub player_id: String,
    /// Most recent messages, oldest first.
    pub messages: Vec<PersistedMessage>,
    /// Completed exchanges.
    #[serde(default)]
    pub conversation_count: u32,
}

/// Serialized form of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    /// Author role, lowercase on write; uppercase is accepted on read.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Epoch milliseconds when the message was recorded.
    #[serde(default)]
    pub timestamp: i64,
}

impl From<&StoredMessage> for PersistedMessage {
    fn from(stored: &StoredMessage) -> Self {
        Self {
            role: stored.message.role,
            content: stored.message.content.clone(),
            timestamp: stored.at.timestamp_millis(),
        }
    }
}

impl PersistedMessage {
    fn into_stored(self) -> StoredMessage {
        let at = DateTime::<Utc>::from_timestamp_millis(self.timestamp).unwrap_or_else(Utc::now);
        StoredMessage {
            message: ChatMessage {
                role: self.role,
                content: self.content,
            },
            at,
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationArchive
// ---------------------------------------------------------------------------

/// Saves and restores a [`ConversationStore`] to a directory of JSON files.
#[derive(Debug, Clone)]
pub struct ConversationArchive {
    dir: PathBuf,
    max_persisted: usize,
    enabled: bool,
}

impl ConversationArchive {
    /// Archive rooted at `dir`, keeping up to `max_persisted` messages per pair.
    pub fn new(dir: impl Into<PathBuf>, max_persisted: usize) -> Self {
        Self {
            dir: dir.into(),
            max_persisted,
            enabled: true,
        }
    }

    /// Archive described by configuration. `persist = false` turns every
    /// operation into a no-op.
    #[must_use]
    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.directory),
            max_persisted: config.max_persisted_messages,
            enabled: config.persist,
        }
    }

    /// Directory holding the records.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Whether persistence is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Path of the record for a pair.
    #[must_use]
    pub fn record_path(&self, agent: AgentId, player: PlayerId) -> PathBuf {
        self.dir.join(format!("{agent}_{player}.json"))
    }

    /// Write every non-empty pair. Returns the number of records written.
    ///
    /// # Errors
    /// Fails only if the directory cannot be created; individual record
    /// failures are logged and skipped.
    pub fn save_all(&self, store: &ConversationStore) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }
        let start = Instant::now();
        std::fs::create_dir_all(&self.dir)?;

        let mut saved = 0;
        for (agent, player, record) in store.snapshot() {
            let skip = record.messages.len().saturating_sub(self.max_persisted);
            let persisted = PersistedConversation {
                npc_id: agent.to_string(),
                player_id: player.to_string(),
                messages: record.messages.iter().skip(skip).map(PersistedMessage::from).collect(),
                conversation_count: record.exchange_count,
            };

            let path = self.record_path(agent, player);
            match write_record(&path, &persisted) {
                Ok(()) => saved += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to save conversation"),
            }
        }

        info!(
            saved,
            dir = %self.dir.display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Saved conversation histories"
        );
        Ok(saved)
    }

    /// Restore every `*.json` record in the directory into `store`.
    /// A missing directory loads nothing. Returns the number of records
    /// restored.
    ///
    /// # Errors
    /// Fails only if an existing directory cannot be listed.
    pub fn load_all(&self, store: &ConversationStore) -> Result<usize> {
        if !self.enabled || !self.dir.exists() {
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "Unreadable directory entry");
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match read_record(&path) {
                Ok((agent, player, messages, count)) => {
                    store.restore(agent, player, messages, count);
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to load conversation"),
            }
        }

        info!(loaded, dir = %self.dir.display(), "Loaded conversation histories");
        Ok(loaded)
    }

    /// Delete every persisted record. Returns the number of files removed.
    ///
    /// # Errors
    /// Fails only if an existing directory cannot be listed.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove conversation"),
                }
            }
        }
        debug!(removed, "Cleared persisted conversations");
        Ok(removed)
    }
}

fn write_record(path: &Path, record: &PersistedConversation) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn read_record(path: &Path) -> Result<(AgentId, PlayerId, Vec<StoredMessage>, u32)> {
    let json = std::fs::read_to_string(path)?;
    let record: PersistedConversation = serde_json::from_str(&json)?;

    let invalid = |reason: String| ParleyError::InvalidRecord {
        path: path.display().to_string(),
        reason,
    };
    let agent = record
        .npc_id
        .parse::<AgentId>()
        .map_err(|e| invalid(format!("npcId: {e}")))?;
    let player = record
        .player_id
        .parse::<PlayerId>()
        .map_err(|e| invalid(format!("playerId: {e}")))?;

    let messages = record.messages.into_iter().map(PersistedMessage::into_stored).collect();
    Ok((agent, player, messages, record.conversation_count))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
