//! Outbound webhooks for story events.
//!
//! Delivery is best effort: one timed POST, no retry. Failures are logged
//! and reported to the caller as `Err`, never surfaced to players.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::config::WebhookConfig;
use parley_core::metrics::ParleyCounters;
use parley_core::types::{AgentId, PlayerId};
use parley_core::world::WorldSnapshot;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::WebhookError;
use crate::events::StoryEvent;

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The agent a webhook is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpcInfo {
    /// Agent instance id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Character sheet id.
    pub character_id: String,
}

/// The player involved, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    /// Player name.
    pub name: String,
    /// Player id.
    pub uuid: String,
}

impl PlayerInfo {
    /// Build from a player id and name.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: id.to_string(),
        }
    }
}

/// Coarse world state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldInfo {
    /// Full dimension id.
    pub dimension: String,
    /// `morning`, `day`, `evening` or `night`.
    pub time: &'static str,
    /// `clear`, `rain` or `thunder`.
    pub weather: &'static str,
}

impl From<&WorldSnapshot> for WorldInfo {
    fn from(world: &WorldSnapshot) -> Self {
        Self {
            dimension: world.dimension.clone(),
            time: world.time_of_day().as_str(),
            weather: world.weather.as_str(),
        }
    }
}

/// JSON body of every webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    /// Which story event fired.
    pub event: StoryEvent,
    /// The agent.
    pub npc: NpcInfo,
    /// The player, omitted without player context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerInfo>,
    /// Event-specific scalar fields.
    pub data: Map<String, Value>,
    /// World state, omitted when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world: Option<WorldInfo>,
    /// ISO-8601 instant in UTC.
    pub timestamp: String,
}

impl WebhookPayload {
    /// A payload stamped with the current time.
    #[must_use]
    pub fn new(event: StoryEvent, npc: NpcInfo) -> Self {
        Self::at(event, npc, Utc::now())
    }

    /// A payload stamped with `at`.
    #[must_use]
    pub fn at(event: StoryEvent, npc: NpcInfo, at: DateTime<Utc>) -> Self {
        Self {
            event,
            npc,
            player: None,
            data: Map::new(),
            world: None,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Attach the player.
    #[must_use]
    pub fn with_player(mut self, player: PlayerInfo) -> Self {
        self.player = Some(player);
        self
    }

    /// Attach world state.
    #[must_use]
    pub fn with_world(mut self, world: &WorldSnapshot) -> Self {
        self.world = Some(WorldInfo::from(world));
        self
    }

    /// Add a scalar data field.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Shorthand for the `npc` block.
#[must_use]
pub fn npc_info(agent: AgentId, name: &str, character_id: &str) -> NpcInfo {
    NpcInfo {
        id: agent.to_string(),
        name: name.to_string(),
        character_id: character_id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Sends webhook payloads to the URL configured for each story event.
pub struct WebhookDispatcher {
    http: Client,
    config: WebhookConfig,
    counters: Arc<ParleyCounters>,
}

impl WebhookDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(config: WebhookConfig, counters: Arc<ParleyCounters>) -> Self {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_default();
        Self { http, config, counters }
    }

    /// URL configured for `event`, if any.
    #[must_use]
    pub fn destination(&self, event: StoryEvent) -> Option<&str> {
        let url = match event {
            StoryEvent::ConversationStarted => &self.config.on_conversation_start,
            StoryEvent::SecretRevealed => &self.config.on_secret_revealed,
            StoryEvent::QuestStarted => &self.config.on_quest_started,
            StoryEvent::QuestCompleted => &self.config.on_quest_completed,
            StoryEvent::MoodChanged => &self.config.on_mood_changed,
            StoryEvent::DangerWarning => &self.config.on_danger_warning,
        };
        let url = url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// POST `payload` and wait for the outcome.
    ///
    /// # Errors
    /// `Disabled` or `NoDestination` without sending anything; `HttpStatus`,
    /// `Timeout` or `Transport` when delivery fails.
    pub async fn send(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let event = payload.event;
        if !self.config.enabled {
            debug!(event = %event, "Webhooks disabled, skipping");
            return Err(WebhookError::Disabled);
        }
        let Some(url) = self.destination(event) else {
            debug!(event = %event, "No webhook configured, skipping");
            return Err(WebhookError::NoDestination(event));
        };

        let start = Instant::now();
        let result = self
            .http
            .post(url)
            .timeout(self.config.timeout())
            .json(payload)
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis();

        match result {
            Ok(resp) if resp.status().is_success() => {
                ParleyCounters::bump(&self.counters.webhooks_sent);
                debug!(event = %event, latency_ms, "Webhook delivered");
                Ok(())
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                ParleyCounters::bump(&self.counters.webhooks_failed);
                warn!(event = %event, url, status, "Webhook receiver returned error status");
                Err(WebhookError::HttpStatus { status })
            }
            Err(e) if e.is_timeout() => {
                ParleyCounters::bump(&self.counters.webhooks_failed);
                warn!(event = %event, url, timeout_ms = self.config.timeout_ms, "Webhook timed out");
                Err(WebhookError::Timeout(self.config.timeout_ms))
            }
            Err(e) => {
                ParleyCounters::bump(&self.counters.webhooks_failed);
                error!(event = %event, url, error = %e, "Webhook request failed");
                Err(WebhookError::from(e))
            }
        }
    }

    /// Send in the background. The handle resolves to whether delivery succeeded.
    pub fn dispatch(self: &Arc<Self>, payload: WebhookPayload) -> JoinHandle<bool> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.send(&payload).await.is_ok() })
    }

    /// Configured request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parley_core::world::Weather;
    use serde_json::json;

    #[test]
    fn payload_shape() {
        let agent = AgentId::new();
        let player = PlayerId::new();
        let world = WorldSnapshot {
            dimension: "minecraft:the_nether".to_string(),
            day_time: 13_000,
            weather: Weather::Rain,
            ..WorldSnapshot::default()
        };
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).single().expect("valid date");

        let payload = WebhookPayload::at(StoryEvent::QuestStarted, npc_info(agent, "Eldric", "eldric"), at)
            .with_player(PlayerInfo::new(player, "Alex"))
            .with_world(&world)
            .with_data("quest", "The Lost Fragment")
            .with_data("reveal_level", 2);

        let value = serde_json::to_value(&payload).expect("encode");
        assert_eq!(
            value,
            json!({
                "event": "quest_started",
                "npc": { "id": agent.to_string(), "name": "Eldric", "character_id": "eldric" },
                "player": { "name": "Alex", "uuid": player.to_string() },
                "data": { "quest": "The Lost Fragment", "reveal_level": 2 },
                "world": { "dimension": "minecraft:the_nether", "time": "evening", "weather": "rain" },
                "timestamp": "2025-03-14T09:26:53.000Z"
            })
        );
    }

    #[test]
    fn optional_blocks_are_omitted() {
        let payload = WebhookPayload::new(StoryEvent::MoodChanged, npc_info(AgentId::new(), "Eldric", "eldric"));
        let value = serde_json::to_value(&payload).expect("encode");
        assert!(value.get("player").is_none());
        assert!(value.get("world").is_none());
        assert_eq!(value["data"], json!({}));
    }

    #[test]
    fn blank_urls_have_no_destination() {
        let config = WebhookConfig {
            on_quest_started: "http://localhost:9/quest".to_string(),
            on_mood_changed: "   ".to_string(),
            ..WebhookConfig::default()
        };
        let dispatcher = WebhookDispatcher::new(config, Arc::new(ParleyCounters::new()));
        assert_eq!(dispatcher.destination(StoryEvent::QuestStarted), Some("http://localhost:9/quest"));
        assert_eq!(dispatcher.destination(StoryEvent::MoodChanged), None);
        assert_eq!(dispatcher.destination(StoryEvent::DangerWarning), None);
    }
}
