//! Story hooks: what happens in the outside world when an agent reaches a
//! story beat.
//!
//! A story event may start an output-signal emission (if the character's
//! sheet has a matching story trigger) and always attempts a webhook.

use std::sync::Arc;

use parley_core::character::CharacterSheet;
use parley_core::types::AgentId;
use parley_core::world::WorldSnapshot;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bridge::EnvironmentalBridge;
use crate::events::StoryEvent;
use crate::webhook::{npc_info, PlayerInfo, WebhookDispatcher, WebhookPayload};

/// Who a story event is about.
#[derive(Debug, Clone, Copy)]
pub struct StoryOrigin<'a> {
    /// Agent instance.
    pub agent: AgentId,
    /// The agent's character sheet.
    pub sheet: &'a CharacterSheet,
    /// Player involved, if any.
    pub player: Option<&'a PlayerInfo>,
    /// World state, if known.
    pub world: Option<&'a WorldSnapshot>,
}

/// Fire a story event: emit the configured signal and send the webhook.
///
/// The returned handle resolves to whether the webhook was delivered.
pub fn trigger_story_event(
    bridge: &EnvironmentalBridge,
    webhooks: &Arc<WebhookDispatcher>,
    origin: &StoryOrigin<'_>,
    event: StoryEvent,
    data: Map<String, Value>,
    tick: u64,
) -> JoinHandle<bool> {
    if let Some(trigger) = origin.sheet.story_trigger(event.as_str()) {
        if bridge.emit(origin.agent, trigger, tick) {
            debug!(agent = %origin.agent, event = %event, pattern = %trigger.pattern, "Story event emitting signal");
        }
    }

    let mut payload = WebhookPayload::new(event, npc_info(origin.agent, &origin.sheet.name, &origin.sheet.id));
    payload.data = data;
    if let Some(player) = origin.player {
        payload = payload.with_player(player.clone());
    }
    if let Some(world) = origin.world {
        payload = payload.with_world(world);
    }
    webhooks.dispatch(payload)
}

/// Announce that a conversation opened.
pub fn on_conversation_opened(
    bridge: &EnvironmentalBridge,
    webhooks: &Arc<WebhookDispatcher>,
    origin: &StoryOrigin<'_>,
    tick: u64,
) -> JoinHandle<bool> {
    trigger_story_event(bridge, webhooks, origin, StoryEvent::ConversationStarted, Map::new(), tick)
}
