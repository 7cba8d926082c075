//! Conversation orchestration.
//!
//! Each registered agent runs a small state machine:
//!
//! ```text
//!            accept                      complete (always, via Turn drop)
//!   Idle ─────────────▶ AwaitingResponse ─────────────────────────────▶ Idle
//! ```
//!
//! At most one request is in flight per agent, whichever player sent it.
//! Alongside it, an agent is "in conversation" with one player from the
//! first accepted message until it goes quiet for the configured timeout or
//! the conversation is ended explicitly.
//!
//! Replies are recorded in the [`ConversationStore`] only when the provider
//! produced real text. Sentinel replies reach the player but leave history
//! and exchange counts untouched.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use parley_core::character::CharacterSheet;
use parley_core::config::ConversationConfig;
use parley_core::conversation::ConversationStore;
use parley_core::knowledge::{build_knowledge_context, KnowledgeSource};
use parley_core::metrics::ParleyCounters;
use parley_core::types::{AgentId, ChatMessage, PlayerId};
use parley_core::world::WorldSnapshot;
use parley_llm::manager::{sentinel_for, ProviderManager};
use parley_llm::prompt::{self, PromptContext};
use parley_llm::LlmError;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Rejection;
use crate::events::ExternalEvent;

// ---------------------------------------------------------------------------
// Requests & replies
// ---------------------------------------------------------------------------

/// A player's message to an agent.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Addressed agent.
    pub agent: AgentId,
    /// Speaking player.
    pub player: PlayerId,
    /// Player display name.
    pub player_name: String,
    /// What the player said.
    pub message: String,
    /// Surroundings at the time of the message.
    pub world: Option<WorldSnapshot>,
}

impl ChatRequest {
    /// A request without world context.
    #[must_use]
    pub fn new(agent: AgentId, player: PlayerId, player_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent,
            player,
            player_name: player_name.into(),
            message: message.into(),
            world: None,
        }
    }

    /// Attach a world snapshot.
    #[must_use]
    pub fn with_world(mut self, world: WorldSnapshot) -> Self {
        self.world = Some(world);
        self
    }
}

/// How a reply came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The provider answered; the exchange was recorded.
    Answered,
    /// The provider failed; the text is a sentinel and nothing was recorded.
    Fallback,
    /// The agent went away while waiting; nothing was recorded.
    Discarded,
}

/// Result of one accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Answering agent.
    pub agent: AgentId,
    /// Player answered.
    pub player: PlayerId,
    /// Text to deliver.
    pub text: String,
    /// How the text was produced.
    pub outcome: ReplyOutcome,
    /// This message opened a new conversation.
    pub conversation_started: bool,
}

// ---------------------------------------------------------------------------
// Per-agent state
// ---------------------------------------------------------------------------

/// The player an agent is currently talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveConversation {
    /// Conversation partner.
    pub player: PlayerId,
    /// When it opened.
    pub started_at: DateTime<Utc>,
    /// Last accepted message.
    pub last_activity: DateTime<Utc>,
}

struct AgentSlot {
    sheet: CharacterSheet,
    awaiting: AtomicBool,
    conversation: Mutex<Option<ActiveConversation>>,
    pending_context: Mutex<Option<String>>,
}

impl AgentSlot {
    fn new(sheet: CharacterSheet) -> Self {
        Self {
            sheet,
            awaiting: AtomicBool::new(false),
            conversation: Mutex::new(None),
            pending_context: Mutex::new(None),
        }
    }

    /// Open or refresh the conversation with `player`; true if newly opened.
    fn touch_conversation(&self, player: PlayerId, now: DateTime<Utc>) -> bool {
        let mut conversation = self.conversation.lock();
        if let Some(active) = conversation.as_mut().filter(|c| c.player == player) {
            active.last_activity = now;
            return false;
        }
        *conversation = Some(ActiveConversation {
            player,
            started_at: now,
            last_activity: now,
        });
        true
    }
}

/// Exclusive right to answer one message. Dropping it returns the agent to Idle.
pub struct Turn {
    slot: Arc<AgentSlot>,
    conversation_started: bool,
}

impl Turn {
    /// Whether this message opened a new conversation.
    #[must_use]
    pub fn conversation_started(&self) -> bool {
        self.conversation_started
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.slot.awaiting.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Routes player messages to agents and providers.
pub struct ConversationOrchestrator {
    agents: DashMap<AgentId, Arc<AgentSlot>>,
    store: Arc<ConversationStore>,
    providers: Arc<ProviderManager>,
    knowledge: Option<Arc<dyn KnowledgeSource>>,
    config: ConversationConfig,
    setting: String,
    pool: Arc<Semaphore>,
    counters: Arc<ParleyCounters>,
}

impl ConversationOrchestrator {
    /// Create an orchestrator with no agents.
    #[must_use]
    pub fn new(
        config: ConversationConfig,
        store: Arc<ConversationStore>,
        providers: Arc<ProviderManager>,
        counters: Arc<ParleyCounters>,
    ) -> Self {
        Self {
            agents: DashMap::new(),
            store,
            providers,
            knowledge: None,
            pool: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            config,
            setting: prompt::DEFAULT_SETTING.to_string(),
            counters,
        }
    }

    /// Inject knowledge entries into prompts.
    #[must_use]
    pub fn with_knowledge(mut self, source: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge = Some(source);
        self
    }

    /// Name the world agents live in (used in the prompt rules).
    #[must_use]
    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = setting.into();
        self
    }

    // -- Agents -------------------------------------------------------------

    /// Register an agent, replacing any previous registration.
    pub fn register_agent(&self, agent: AgentId, sheet: CharacterSheet) {
        info!(agent = %agent, character = %sheet.id, "Agent registered");
        self.agents.insert(agent, Arc::new(AgentSlot::new(sheet)));
    }

    /// Remove an agent. In-flight replies for it are discarded.
    pub fn remove_agent(&self, agent: AgentId) -> bool {
        let removed = self.agents.remove(&agent).is_some();
        if removed {
            debug!(agent = %agent, "Agent removed");
        }
        removed
    }

    /// The agent's character sheet.
    #[must_use]
    pub fn character(&self, agent: AgentId) -> Option<CharacterSheet> {
        self.agents.get(&agent).map(|slot| slot.sheet.clone())
    }

    /// All registered agents.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|entry| *entry.key()).collect()
    }

    fn slot(&self, agent: AgentId) -> Option<Arc<AgentSlot>> {
        self.agents.get(&agent).map(|slot| Arc::clone(&slot))
    }

    // -- Messages -----------------------------------------------------------

    /// Claim the agent for `request`.
    ///
    /// # Errors
    /// [`Rejection::UnknownAgent`], [`Rejection::StillThinking`] while another
    /// request is in flight, or [`Rejection::RateLimited`] inside the
    /// per-player gap.
    pub fn accept(&self, request: &ChatRequest) -> Result<Turn, Rejection> {
        self.accept_at(request, Utc::now())
    }

    /// [`accept`](Self::accept) with an explicit clock.
    ///
    /// # Errors
    /// As [`accept`](Self::accept).
    pub fn accept_at(&self, request: &ChatRequest, now: DateTime<Utc>) -> Result<Turn, Rejection> {
        ParleyCounters::bump(&self.counters.chats_requested);
        let slot = self.slot(request.agent).ok_or(Rejection::UnknownAgent(request.agent))?;

        if slot
            .awaiting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            ParleyCounters::bump(&self.counters.chats_rejected_busy);
            debug!(agent = %request.agent, "Agent busy, rejecting message");
            return Err(Rejection::StillThinking {
                name: slot.sheet.name.clone(),
            });
        }
        let mut turn = Turn {
            slot,
            conversation_started: false,
        };

        if !self.store.can_interact_at(request.agent, request.player, now) {
            ParleyCounters::bump(&self.counters.chats_rate_limited);
            let retry_after = self.store.time_until_can_interact_at(request.agent, request.player, now);
            debug!(agent = %request.agent, player = %request.player, "Player rate limited");
            return Err(Rejection::RateLimited { retry_after });
        }

        turn.conversation_started = turn.slot.touch_conversation(request.player, now);
        if turn.conversation_started {
            info!(agent = %request.agent, player = %request.player_name, "Conversation started");
        }
        Ok(turn)
    }

    /// Answer an accepted request. This is the single completion point.
    pub async fn run_turn(&self, turn: Turn, request: ChatRequest) -> ChatReply {
        let system_prompt = self.build_system_prompt(&turn.slot, &request);
        let mut messages = self.store.get_history(request.agent, request.player);
        messages.push(ChatMessage::user(request.message.clone()));

        let result = self.providers.try_chat(&system_prompt, &messages).await;
        self.complete(turn, request, result)
    }

    fn complete(&self, turn: Turn, request: ChatRequest, result: Result<String, LlmError>) -> ChatReply {
        let still_registered = self
            .agents
            .get(&request.agent)
            .is_some_and(|slot| Arc::ptr_eq(&slot, &turn.slot));

        let (text, outcome) = match result {
            Ok(text) if still_registered => {
                self.store
                    .add_message(request.agent, request.player, ChatMessage::user(request.message));
                self.store
                    .add_message(request.agent, request.player, ChatMessage::assistant(text.clone()));
                self.store.increment_exchange_count(request.agent, request.player);
                ParleyCounters::bump(&self.counters.chats_completed);
                (text, ReplyOutcome::Answered)
            }
            Ok(text) => {
                debug!(agent = %request.agent, "Agent removed while waiting, discarding reply");
                (text, ReplyOutcome::Discarded)
            }
            Err(e) => {
                ParleyCounters::bump(&self.counters.chats_failed);
                warn!(agent = %request.agent, error = %e, "Chat failed, answering with fallback text");
                (sentinel_for(&e).to_string(), ReplyOutcome::Fallback)
            }
        };

        ChatReply {
            agent: request.agent,
            player: request.player,
            text,
            outcome,
            conversation_started: turn.conversation_started,
        }
    }

    /// Accept and answer inline.
    ///
    /// # Errors
    /// The [`Rejection`] from [`accept`](Self::accept).
    pub async fn handle_message(&self, request: ChatRequest) -> Result<ChatReply, Rejection> {
        let turn = self.accept(&request)?;
        Ok(self.run_turn(turn, request).await)
    }

    /// Accept now and answer on the background pool.
    ///
    /// # Errors
    /// The [`Rejection`] from [`accept`](Self::accept); nothing is spawned.
    pub fn spawn_message(self: &Arc<Self>, request: ChatRequest) -> Result<JoinHandle<ChatReply>, Rejection> {
        let turn = self.accept(&request)?;
        Ok(self.spawn_turn(turn, request))
    }

    /// Answer an already accepted request on the background pool.
    pub fn spawn_turn(self: &Arc<Self>, turn: Turn, request: ChatRequest) -> JoinHandle<ChatReply> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = Arc::clone(&this.pool).acquire_owned().await.ok();
            this.run_turn(turn, request).await
        })
    }

    fn build_system_prompt(&self, slot: &AgentSlot, request: &ChatRequest) -> String {
        let external = slot.pending_context.lock().take();
        let knowledge = self.knowledge.as_deref().and_then(|source| {
            build_knowledge_context(source, &slot.sheet.id, &request.message, self.config.max_knowledge_entries)
        });
        let summary = self.store.build_summary(request.agent, request.player);
        let world = if self.config.include_world_context {
            request.world.as_ref()
        } else {
            None
        };

        prompt::assemble_system_prompt(&PromptContext {
            character: &slot.sheet,
            world,
            external_context: external.as_deref(),
            knowledge_context: knowledge.as_deref(),
            history_summary: &summary,
            setting: &self.setting,
        })
    }

    // -- External events ----------------------------------------------------

    /// Queue context for the agent's next prompt; the latest event wins.
    ///
    /// Returns the announcement the character makes, if its sheet
    /// configures one for this event kind.
    pub fn on_external_event(&self, agent: AgentId, event: &ExternalEvent) -> Option<String> {
        let slot = self.slot(agent)?;
        let trigger = slot.sheet.external_trigger(event.kind.key());

        let context = trigger
            .map(|t| t.inject_context.trim())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| event.kind.default_context());
        *slot.pending_context.lock() = Some(context.to_string());
        debug!(agent = %agent, kind = %event.kind, "External event queued for next prompt");

        trigger
            .map(|t| t.message.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }

    /// Context waiting for the agent's next prompt.
    #[must_use]
    pub fn pending_context(&self, agent: AgentId) -> Option<String> {
        self.slot(agent).and_then(|slot| slot.pending_context.lock().clone())
    }

    // -- Conversation window ------------------------------------------------

    /// Start (or refresh) a conversation without a message. True if new.
    pub fn open_conversation(&self, agent: AgentId, player: PlayerId) -> bool {
        self.slot(agent)
            .is_some_and(|slot| slot.touch_conversation(player, Utc::now()))
    }

    /// End the agent's conversation, returning the former partner.
    pub fn end_conversation(&self, agent: AgentId) -> Option<PlayerId> {
        let slot = self.slot(agent)?;
        let ended = slot.conversation.lock().take().map(|c| c.player);
        if let Some(player) = ended {
            debug!(agent = %agent, player = %player, "Conversation ended");
        }
        ended
    }

    /// End every conversation idle for longer than the timeout.
    pub fn end_idle_conversations(&self, now: DateTime<Utc>) -> Vec<(AgentId, PlayerId)> {
        let timeout = self.config.conversation_timeout();
        let mut ended = Vec::new();
        for entry in &self.agents {
            let mut conversation = entry.value().conversation.lock();
            if let Some(active) = *conversation {
                if now - active.last_activity > timeout {
                    *conversation = None;
                    ended.push((*entry.key(), active.player));
                }
            }
        }
        if !ended.is_empty() {
            debug!(count = ended.len(), "Idle conversations ended");
        }
        ended
    }

    /// Whether the agent is waiting on a provider.
    #[must_use]
    pub fn is_thinking(&self, agent: AgentId) -> bool {
        self.slot(agent)
            .is_some_and(|slot| slot.awaiting.load(Ordering::Acquire))
    }

    /// Whether the agent is in a conversation.
    #[must_use]
    pub fn is_in_conversation(&self, agent: AgentId) -> bool {
        self.conversation(agent).is_some()
    }

    /// The agent's current conversation.
    #[must_use]
    pub fn conversation(&self, agent: AgentId) -> Option<ActiveConversation> {
        self.slot(agent).and_then(|slot| *slot.conversation.lock())
    }

    // -- Accessors ----------------------------------------------------------

    /// Shared conversation store.
    #[must_use]
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Shared provider manager.
    #[must_use]
    pub fn providers(&self) -> &Arc<ProviderManager> {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parley_core::character::ExternalTrigger;
    use parley_core::config::ProviderKind;
    use parley_core::knowledge::KnowledgeEntry;
    use parley_llm::mock::ScriptedProvider;
    use parley_llm::{ChatProvider, NO_PROVIDER_RESPONSE};

    use crate::events::ExternalEventKind;

    struct Fixture {
        orchestrator: Arc<ConversationOrchestrator>,
        provider: Arc<ScriptedProvider>,
        agent: AgentId,
        player: PlayerId,
    }

    async fn fixture(provider: ScriptedProvider, config: ConversationConfig) -> Fixture {
        let provider = Arc::new(provider);
        let manager = ProviderManager::with_providers(
            ProviderKind::Ollama,
            [Arc::clone(&provider) as Arc<dyn ChatProvider>],
            Duration::from_millis(500),
        );
        manager.initialize().await;

        let store = Arc::new(ConversationStore::from_config(&config));
        let orchestrator = ConversationOrchestrator::new(
            config,
            store,
            Arc::new(manager),
            Arc::new(ParleyCounters::new()),
        );
        let agent = AgentId::new();
        orchestrator.register_agent(agent, CharacterSheet::eldric());
        Fixture {
            orchestrator: Arc::new(orchestrator),
            provider,
            agent,
            player: PlayerId::new(),
        }
    }

    fn no_gap() -> ConversationConfig {
        ConversationConfig {
            min_message_gap_ms: 0,
            ..ConversationConfig::default()
        }
    }

    #[tokio::test]
    async fn reply_is_recorded_once() {
        let fx = fixture(ScriptedProvider::new(ProviderKind::Ollama).replying("Greetings."), no_gap()).await;
        let reply = fx
            .orchestrator
            .handle_message(ChatRequest::new(fx.agent, fx.player, "Alex", "Hello"))
            .await
            .expect("accepted");

        assert_eq!(reply.text, "Greetings.");
        assert_eq!(reply.outcome, ReplyOutcome::Answered);
        assert!(reply.conversation_started);

        let store = fx.orchestrator.store();
        assert_eq!(
            store.get_history(fx.agent, fx.player),
            vec![ChatMessage::user("Hello"), ChatMessage::assistant("Greetings.")]
        );
        assert_eq!(store.exchange_count(fx.agent, fx.player), 1);
        assert!(!fx.orchestrator.is_thinking(fx.agent));
        assert!(fx.orchestrator.is_in_conversation(fx.agent));
    }

    #[tokio::test]
    async fn prompt_carries_history_and_new_message() {
        let fx = fixture(
            ScriptedProvider::new(ProviderKind::Ollama).with_replies(["First.", "Second."]),
            no_gap(),
        )
        .await;
        let ask = |text: &str| ChatRequest::new(fx.agent, fx.player, "Alex", text);

        fx.orchestrator.handle_message(ask("One")).await.expect("accepted");
        let second = fx.orchestrator.handle_message(ask("Two")).await.expect("accepted");
        assert!(!second.conversation_started);

        let calls = fx.provider.recorded();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1].messages,
            vec![
                ChatMessage::user("One"),
                ChatMessage::assistant("First."),
                ChatMessage::user("Two"),
            ]
        );
        assert!(calls[0].system_prompt.contains("This is your first conversation with this player."));
        assert!(calls[1].system_prompt.contains("You have had 1 conversation(s) with this player."));
    }

    #[tokio::test]
    async fn second_message_while_thinking_is_rejected() {
        let fx = fixture(
            ScriptedProvider::new(ProviderKind::Ollama).chat_delay(Duration::from_millis(100)),
            no_gap(),
        )
        .await;
        let other_player = PlayerId::new();

        let pending = fx
            .orchestrator
            .spawn_message(ChatRequest::new(fx.agent, fx.player, "Alex", "Hello"))
            .expect("accepted");
        assert!(fx.orchestrator.is_thinking(fx.agent));

        let busy = fx
            .orchestrator
            .handle_message(ChatRequest::new(fx.agent, other_player, "Sam", "Me too"))
            .await
            .expect_err("busy");
        assert_eq!(busy.notice().as_deref(), Some("[Eldric is still thinking...]"));

        pending.await.expect("task completes");
        assert!(!fx.orchestrator.is_thinking(fx.agent));
        assert_eq!(fx.provider.chat_calls(), 1);
    }

    #[tokio::test]
    async fn provider_failure_returns_sentinel_and_releases_agent() {
        let fx = fixture(ScriptedProvider::new(ProviderKind::Ollama).failing_chat(), no_gap()).await;
        let reply = fx
            .orchestrator
            .handle_message(ChatRequest::new(fx.agent, fx.player, "Alex", "Hello"))
            .await
            .expect("accepted");

        assert_eq!(reply.outcome, ReplyOutcome::Fallback);
        assert_eq!(reply.text, parley_llm::LOST_IN_THOUGHT_RESPONSE);
        assert!(fx.orchestrator.store().get_history(fx.agent, fx.player).is_empty());
        assert_eq!(fx.orchestrator.store().exchange_count(fx.agent, fx.player), 0);
        assert!(!fx.orchestrator.is_thinking(fx.agent));
    }

    #[tokio::test]
    async fn no_provider_yields_sentinel_without_calls() {
        let fx = fixture(ScriptedProvider::new(ProviderKind::Ollama).failing_init(), no_gap()).await;
        let reply = fx
            .orchestrator
            .handle_message(ChatRequest::new(fx.agent, fx.player, "Alex", "Hello"))
            .await
            .expect("accepted");
        assert_eq!(reply.text, NO_PROVIDER_RESPONSE);
        assert_eq!(fx.provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn rate_limit_applies_per_pair() {
        let fx = fixture(ScriptedProvider::new(ProviderKind::Ollama), ConversationConfig::default()).await;
        let now = Utc::now();
        fx.orchestrator
            .store()
            .add_message_at(fx.agent, fx.player, ChatMessage::user("earlier"), now);

        let limited = fx
            .orchestrator
            .accept_at(&ChatRequest::new(fx.agent, fx.player, "Alex", "again"), now + chrono::Duration::milliseconds(400))
            .err()
            .expect("rate limited");
        assert_eq!(
            limited,
            Rejection::RateLimited {
                retry_after: chrono::Duration::milliseconds(600)
            }
        );
        assert_eq!(limited.notice(), None);
        assert!(!fx.orchestrator.is_thinking(fx.agent));

        let other = ChatRequest::new(fx.agent, PlayerId::new(), "Sam", "hi");
        assert!(fx.orchestrator.accept_at(&other, now).is_ok());
    }

    #[tokio::test]
    async fn external_context_is_used_once() {
        let mut sheet = CharacterSheet::eldric();
        sheet.external_triggers.insert(
            "signal_on".to_string(),
            ExternalTrigger {
                message: "Did you feel that?".to_string(),
                ..ExternalTrigger::default()
            },
        );
        let fx = fixture(ScriptedProvider::new(ProviderKind::Ollama), no_gap()).await;
        fx.orchestrator.register_agent(fx.agent, sheet);

        let announcement = fx
            .orchestrator
            .on_external_event(fx.agent, &ExternalEvent::new(ExternalEventKind::SignalOn));
        assert_eq!(announcement.as_deref(), Some("Did you feel that?"));
        assert!(fx
            .orchestrator
            .on_external_event(fx.agent, &ExternalEvent::new(ExternalEventKind::Custom))
            .is_none());

        let ask = |text: &str| ChatRequest::new(fx.agent, fx.player, "Alex", text);
        fx.orchestrator.handle_message(ask("What was that?")).await.expect("accepted");
        fx.orchestrator.handle_message(ask("Hm?")).await.expect("accepted");

        let calls = fx.provider.recorded();
        // Latest event wins, and only the next prompt sees it.
        assert!(calls[0].system_prompt.contains("Something unusual has occurred."));
        assert!(!calls[0].system_prompt.contains("You sense a disturbance"));
        assert!(!calls[1].system_prompt.contains("## Something Just Happened"));
        assert_eq!(fx.orchestrator.pending_context(fx.agent), None);
    }

    #[tokio::test]
    async fn knowledge_and_world_reach_the_prompt() {
        let fx = fixture(ScriptedProvider::new(ProviderKind::Ollama), no_gap()).await;
        let source = |character: &str, _: &str| {
            vec![KnowledgeEntry {
                id: "ruin".to_string(),
                category: "lore".to_string(),
                keywords: vec![],
                content: format!("{character} once slept in the northern ruin."),
                priority: 5,
            }]
        };
        let orchestrator = ConversationOrchestrator::new(
            no_gap(),
            Arc::clone(fx.orchestrator.store()),
            Arc::clone(fx.orchestrator.providers()),
            Arc::new(ParleyCounters::new()),
        )
        .with_knowledge(Arc::new(source))
        .with_setting("the Shattered Vale");
        orchestrator.register_agent(fx.agent, CharacterSheet::eldric());

        let request = ChatRequest::new(fx.agent, fx.player, "Alex", "Tell me of ruins").with_world(WorldSnapshot {
            player_name: "Alex".to_string(),
            ..WorldSnapshot::default()
        });
        orchestrator.handle_message(request).await.expect("accepted");

        let prompt = &fx.provider.recorded()[0].system_prompt;
        assert!(prompt.contains("- eldric once slept in the northern ruin."));
        assert!(prompt.contains("- Speaking with: Alex"));
        assert!(prompt.contains("- You exist in the Shattered Vale"));
    }

    #[tokio::test]
    async fn removed_agent_discards_reply() {
        let fx = fixture(
            ScriptedProvider::new(ProviderKind::Ollama).chat_delay(Duration::from_millis(50)),
            no_gap(),
        )
        .await;
        let pending = fx
            .orchestrator
            .spawn_message(ChatRequest::new(fx.agent, fx.player, "Alex", "Hello"))
            .expect("accepted");
        assert!(fx.orchestrator.remove_agent(fx.agent));

        let reply = pending.await.expect("task completes");
        assert_eq!(reply.outcome, ReplyOutcome::Discarded);
        assert!(fx.orchestrator.store().get_history(fx.agent, fx.player).is_empty());
    }

    #[tokio::test]
    async fn idle_conversations_time_out() {
        let fx = fixture(ScriptedProvider::new(ProviderKind::Ollama), no_gap()).await;
        assert!(fx.orchestrator.open_conversation(fx.agent, fx.player));
        assert!(!fx.orchestrator.open_conversation(fx.agent, fx.player));

        let now = Utc::now();
        assert!(fx.orchestrator.end_idle_conversations(now).is_empty());
        let ended = fx
            .orchestrator
            .end_idle_conversations(now + chrono::Duration::seconds(61));
        assert_eq!(ended, vec![(fx.agent, fx.player)]);
        assert!(!fx.orchestrator.is_in_conversation(fx.agent));
        assert_eq!(fx.orchestrator.end_conversation(fx.agent), None);
    }
}
