//! Owned wiring of every Parley service.
//!
//! ```text
//! ParleyConfig ─▶ ParleyRuntime
//!                  ├─ ProviderManager        (parley-llm)
//!                  ├─ ConversationStore ◀──▶ ConversationArchive (disk)
//!                  ├─ ConversationOrchestrator
//!                  ├─ EnvironmentalBridge
//!                  ├─ WebhookDispatcher
//!                  └─ TickBudgetMonitor
//! ```
//!
//! `start` brings providers up and reloads saved conversations; `shutdown`
//! saves them again and releases the providers.

use std::sync::Arc;
use std::time::Duration;

use parley_core::config::ParleyConfig;
use parley_core::conversation::ConversationStore;
use parley_core::metrics::{ParleyCounters, TickBudgetMonitor};
use parley_core::persistence::ConversationArchive;
use parley_core::types::AgentId;
use parley_core::world::WorldSnapshot;
use parley_llm::manager::ProviderManager;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bridge::EnvironmentalBridge;
use crate::dialogue::{ChatReply, ChatRequest, ConversationOrchestrator};
use crate::error::Rejection;
use crate::events::StoryEvent;
use crate::hooks::{self, StoryOrigin};
use crate::systems::{TickDriver, WorldView};
use crate::webhook::{PlayerInfo, WebhookDispatcher};

/// Tick budget at 20 ticks per second.
pub const TICK_BUDGET_MS: f64 = 50.0;

/// What [`ParleyRuntime::start`] brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartReport {
    /// Whether a chat provider is active.
    pub provider_ready: bool,
    /// Conversation records restored from disk.
    pub conversations_loaded: usize,
}

/// Every Parley service, built from one configuration.
pub struct ParleyRuntime {
    config: ParleyConfig,
    counters: Arc<ParleyCounters>,
    store: Arc<ConversationStore>,
    archive: ConversationArchive,
    providers: Arc<ProviderManager>,
    orchestrator: Arc<ConversationOrchestrator>,
    bridge: Arc<EnvironmentalBridge>,
    webhooks: Arc<WebhookDispatcher>,
    monitor: Arc<TickBudgetMonitor>,
}

impl ParleyRuntime {
    /// Build the real provider adapters from `config.llm`.
    #[must_use]
    pub fn from_config(config: ParleyConfig) -> Self {
        let providers = ProviderManager::from_config(&config.llm);
        Self::with_providers(config, providers)
    }

    /// Build around an already assembled provider manager.
    #[must_use]
    pub fn with_providers(config: ParleyConfig, providers: ProviderManager) -> Self {
        let counters = Arc::new(ParleyCounters::new());
        let store = Arc::new(ConversationStore::from_config(&config.conversation));
        let providers = Arc::new(providers);
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            config.conversation.clone(),
            Arc::clone(&store),
            Arc::clone(&providers),
            Arc::clone(&counters),
        ));

        Self {
            archive: ConversationArchive::from_config(&config.persistence),
            bridge: Arc::new(EnvironmentalBridge::new(config.bridge.clone(), Arc::clone(&counters))),
            webhooks: Arc::new(WebhookDispatcher::new(config.webhooks.clone(), Arc::clone(&counters))),
            monitor: Arc::new(TickBudgetMonitor::new(TICK_BUDGET_MS)),
            config,
            counters,
            store,
            providers,
            orchestrator,
        }
    }

    /// Initialize providers and reload persisted conversations.
    ///
    /// Neither step is fatal: without a provider every reply is fallback
    /// text, and unreadable records are skipped.
    pub async fn start(&self) -> StartReport {
        let provider_ready = self.providers.initialize().await;

        let conversations_loaded = match self.archive.load_all(&self.store) {
            Ok(loaded) => {
                for _ in 0..loaded {
                    ParleyCounters::bump(&self.counters.conversations_loaded);
                }
                loaded
            }
            Err(e) => {
                error!(dir = %self.archive.directory().display(), error = %e, "Could not load conversations");
                0
            }
        };

        info!(
            provider = ?self.providers.active_provider_name(),
            provider_ready,
            conversations_loaded,
            "Parley runtime started"
        );
        StartReport {
            provider_ready,
            conversations_loaded,
        }
    }

    /// Save conversations and shut providers down. Returns the number of
    /// records written.
    pub fn shutdown(&self) -> usize {
        let saved = match self.archive.save_all(&self.store) {
            Ok(saved) => {
                for _ in 0..saved {
                    ParleyCounters::bump(&self.counters.conversations_saved);
                }
                saved
            }
            Err(e) => {
                error!(dir = %self.archive.directory().display(), error = %e, "Could not save conversations");
                0
            }
        };
        self.providers.shutdown();
        info!(saved, "Parley runtime stopped");
        saved
    }

    /// Accept a player message and answer it in the background.
    ///
    /// A message that opens a conversation also fires the
    /// `conversation_started` story event.
    ///
    /// # Errors
    /// The [`Rejection`] from the orchestrator; nothing is spawned.
    pub fn chat(&self, request: ChatRequest, tick: u64) -> Result<JoinHandle<ChatReply>, Rejection> {
        let turn = self.orchestrator.accept(&request)?;

        if turn.conversation_started() {
            if let Some(sheet) = self.orchestrator.character(request.agent) {
                let player = PlayerInfo::new(request.player, request.player_name.clone());
                let origin = StoryOrigin {
                    agent: request.agent,
                    sheet: &sheet,
                    player: Some(&player),
                    world: request.world.as_ref(),
                };
                drop(hooks::on_conversation_opened(&self.bridge, &self.webhooks, &origin, tick));
            }
        }

        Ok(self.orchestrator.spawn_turn(turn, request))
    }

    /// Fire a story event for a registered agent.
    /// Returns `None` when the agent is unknown.
    pub fn story_event(
        &self,
        agent: AgentId,
        event: StoryEvent,
        player: Option<&PlayerInfo>,
        world: Option<&WorldSnapshot>,
        data: Map<String, Value>,
        tick: u64,
    ) -> Option<JoinHandle<bool>> {
        let Some(sheet) = self.orchestrator.character(agent) else {
            warn!(agent = %agent, event = %event, "Story event for unknown agent");
            return None;
        };
        let origin = StoryOrigin {
            agent,
            sheet: &sheet,
            player,
            world,
        };
        Some(hooks::trigger_story_event(&self.bridge, &self.webhooks, &origin, event, data, tick))
    }

    /// Remove an agent everywhere: conversations, bridge state, emissions.
    pub fn despawn_agent(&self, agent: AgentId) -> bool {
        self.bridge.despawn(agent);
        self.orchestrator.remove_agent(agent)
    }

    /// Start ticking `world` every `period`.
    #[must_use]
    pub fn spawn_driver(&self, world: Arc<dyn WorldView>, period: Duration) -> (TickDriver, JoinHandle<u64>) {
        let driver = TickDriver::new(period);
        let handle = driver.spawn(
            world,
            Arc::clone(&self.bridge),
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.monitor),
        );
        (driver, handle)
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<ParleyCounters> {
        &self.counters
    }

    /// Conversation store.
    #[must_use]
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Provider manager.
    #[must_use]
    pub fn providers(&self) -> &Arc<ProviderManager> {
        &self.providers
    }

    /// Conversation orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<ConversationOrchestrator> {
        &self.orchestrator
    }

    /// Environmental bridge.
    #[must_use]
    pub fn bridge(&self) -> &Arc<EnvironmentalBridge> {
        &self.bridge
    }

    /// Webhook dispatcher.
    #[must_use]
    pub fn webhooks(&self) -> &Arc<WebhookDispatcher> {
        &self.webhooks
    }

    /// Tick timing.
    #[must_use]
    pub fn monitor(&self) -> &Arc<TickBudgetMonitor> {
        &self.monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::character::{CharacterSheet, StoryTrigger};
    use parley_core::config::{PersistenceConfig, ProviderKind};
    use parley_core::types::PlayerId;
    use parley_llm::mock::ScriptedProvider;
    use parley_llm::ChatProvider;

    use crate::dialogue::ReplyOutcome;

    fn runtime(dir: &std::path::Path, provider: ScriptedProvider) -> ParleyRuntime {
        let config = ParleyConfig {
            persistence: PersistenceConfig {
                directory: dir.display().to_string(),
                ..PersistenceConfig::default()
            },
            ..ParleyConfig::default()
        };
        let providers = ProviderManager::with_providers(
            ProviderKind::Ollama,
            [Arc::new(provider) as Arc<dyn ChatProvider>],
            Duration::from_secs(1),
        );
        ParleyRuntime::with_providers(config, providers)
    }

    #[tokio::test]
    async fn conversations_survive_a_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let agent = AgentId::new();
        let player = PlayerId::new();

        let first = runtime(dir.path(), ScriptedProvider::new(ProviderKind::Ollama).replying("Well met."));
        assert_eq!(
            first.start().await,
            StartReport {
                provider_ready: true,
                conversations_loaded: 0
            }
        );
        first.orchestrator().register_agent(agent, CharacterSheet::eldric());
        let reply = first
            .chat(ChatRequest::new(agent, player, "Alex", "Hello"), 0)
            .expect("accepted")
            .await
            .expect("task completes");
        assert_eq!(reply.outcome, ReplyOutcome::Answered);
        assert!(reply.conversation_started);
        assert_eq!(first.shutdown(), 1);
        assert!(!first.providers().is_available());

        let second = runtime(dir.path(), ScriptedProvider::new(ProviderKind::Ollama));
        let report = second.start().await;
        assert_eq!(report.conversations_loaded, 1);
        assert_eq!(second.store().get_history(agent, player).len(), 2);
        assert_eq!(second.store().exchange_count(agent, player), 1);
        assert_eq!(second.counters().snapshot().conversations_loaded, 1);
    }

    #[tokio::test]
    async fn start_without_provider_still_answers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rt = runtime(dir.path(), ScriptedProvider::new(ProviderKind::Ollama).failing_init());
        assert!(!rt.start().await.provider_ready);

        let agent = AgentId::new();
        rt.orchestrator().register_agent(agent, CharacterSheet::eldric());
        let reply = rt
            .chat(ChatRequest::new(agent, PlayerId::new(), "Alex", "Hello?"), 0)
            .expect("accepted")
            .await
            .expect("task completes");
        assert_eq!(reply.outcome, ReplyOutcome::Fallback);
    }

    #[tokio::test]
    async fn story_events_need_a_known_agent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rt = runtime(dir.path(), ScriptedProvider::new(ProviderKind::Ollama));
        assert!(rt
            .story_event(AgentId::new(), StoryEvent::DangerWarning, None, None, Map::new(), 0)
            .is_none());

        let agent = AgentId::new();
        let mut sheet = CharacterSheet::eldric();
        sheet.story_triggers.insert(
            "danger_warning".to_string(),
            StoryTrigger {
                emit_signal: true,
                strength: 15,
                duration_ticks: 40,
                pattern: "sos".to_string(),
            },
        );
        rt.orchestrator().register_agent(agent, sheet);
        let delivered = rt
            .story_event(agent, StoryEvent::DangerWarning, None, None, Map::new(), 3)
            .expect("known agent")
            .await
            .expect("task completes");
        assert!(!delivered);
        assert!(rt.bridge().emissions().current(agent).is_some());

        assert!(rt.despawn_agent(agent));
        assert!(rt.bridge().emissions().current(agent).is_none());
    }
}
