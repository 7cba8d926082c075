//! Per-tick systems.
//!
//! The host implements [`WorldView`]; everything else runs off it.
//!
//! ## Tick Budget
//!
//! | System               | Frequency               |
//! |----------------------|-------------------------|
//! | Signal edge scan     | every `scan_interval`   |
//! | Emission advance     | every tick              |
//! | Idle conversation end| every 20 ticks          |
//!
//! Provider calls never run on the tick; they go through
//! [`ConversationOrchestrator::spawn_message`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_core::metrics::TickBudgetMonitor;
use parley_core::types::{AgentId, BlockPos, PlayerId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeTick, EnvironmentalBridge, TrackedAgent};
use crate::dialogue::ConversationOrchestrator;
use crate::signals::SignalField;

/// Ticks between sweeps for idle conversations.
pub const IDLE_SWEEP_TICKS: u64 = 20;

/// The host world as seen by Parley.
pub trait WorldView: Send + Sync {
    /// Agents to scan around, with their current positions.
    fn agents(&self) -> Vec<TrackedAgent>;

    /// Signal strength at a position (0 = unpowered).
    fn signal_strength(&self, pos: BlockPos) -> u8;

    /// Present `strength` as the agent's output signal.
    fn set_output(&self, agent: AgentId, strength: u8);

    /// Have the agent say something to nearby players.
    fn announce(&self, _agent: AgentId, _message: &str) {}

    /// A conversation ended for lack of activity.
    fn conversation_ended(&self, _agent: AgentId, _player: PlayerId) {}
}

struct ViewField<'a>(&'a dyn WorldView);

impl SignalField for ViewField<'_> {
    fn signal_strength(&self, pos: BlockPos) -> u8 {
        self.0.signal_strength(pos)
    }
}

/// Run one world tick: bridge scan and emissions, then deliver results.
pub fn run_world_tick(
    world: &dyn WorldView,
    bridge: &EnvironmentalBridge,
    orchestrator: &ConversationOrchestrator,
    monitor: &TickBudgetMonitor,
    tick: u64,
) -> BridgeTick {
    let timing = monitor.begin_tick();
    let _span = tracing::debug_span!("parley::tick", tick).entered();

    let agents = world.agents();
    let out = bridge.tick(tick, &agents, &ViewField(world));

    for detected in &out.edges {
        let event = detected.to_external_event();
        if let Some(message) = orchestrator.on_external_event(detected.agent, &event) {
            world.announce(detected.agent, &message);
        }
    }
    for update in &out.outputs {
        world.set_output(update.agent, update.strength);
    }

    if tick % IDLE_SWEEP_TICKS == 0 {
        for (agent, player) in orchestrator.end_idle_conversations(Utc::now()) {
            world.conversation_ended(agent, player);
        }
    }

    drop(timing);
    if monitor.is_over_budget() {
        warn!(
            tick,
            last_ms = monitor.last_tick_ms(),
            budget_ms = monitor.budget_ms(),
            "World tick exceeded budget"
        );
    }
    out
}

/// Drives [`run_world_tick`] on a fixed period until stopped.
pub struct TickDriver {
    period: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl TickDriver {
    /// A driver ticking every `period`.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { period, shutdown_tx }
    }

    /// Start ticking. The handle resolves to the number of ticks run.
    pub fn spawn(
        &self,
        world: Arc<dyn WorldView>,
        bridge: Arc<EnvironmentalBridge>,
        orchestrator: Arc<ConversationOrchestrator>,
        monitor: Arc<TickBudgetMonitor>,
    ) -> JoinHandle<u64> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick = 0u64;
            info!(period_ms = period.as_millis(), "Tick driver started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_world_tick(world.as_ref(), &bridge, &orchestrator, &monitor, tick);
                        tick += 1;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(ticks = tick, "Tick driver stopped");
            tick
        })
    }

    /// Ask every spawned loop to stop after its current tick.
    pub fn stop(&self) {
        debug!("Stopping tick driver");
        self.shutdown_tx.send_replace(true);
    }
}
