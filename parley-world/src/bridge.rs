//! Environmental bridge: ties signal scanning and output emission to ticks.
//!
//! ```text
//! tick ─┬─ every scan_interval ─▶ SignalScanner::scan ─▶ DetectedEdge
//!       └─ every tick ──────────▶ EmissionTracker::advance_all ─▶ EmissionUpdate
//! ```

use std::sync::Arc;

use parley_core::character::StoryTrigger;
use parley_core::config::BridgeConfig;
use parley_core::metrics::ParleyCounters;
use parley_core::types::{AgentId, BlockPos};
use tracing::{debug, info};

use crate::emission::{EmissionTracker, EmissionUpdate};
use crate::events::{ExternalEvent, ExternalEventKind};
use crate::pattern::Pattern;
use crate::signals::{SignalEdge, SignalField, SignalScanner};

/// An agent the bridge scans around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedAgent {
    /// Agent id.
    pub id: AgentId,
    /// Current position.
    pub position: BlockPos,
}

/// An edge attributed to the agent that observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedEdge {
    /// Observing agent.
    pub agent: AgentId,
    /// The transition.
    pub edge: SignalEdge,
}

impl DetectedEdge {
    /// The stimulus to hand to the agent's conversation.
    #[must_use]
    pub fn to_external_event(&self) -> ExternalEvent {
        match self.edge {
            SignalEdge::Activated { pos, strength } => ExternalEvent {
                kind: ExternalEventKind::SignalOn,
                position: Some(pos),
                strength: Some(strength),
            },
            SignalEdge::Deactivated { pos } => ExternalEvent {
                kind: ExternalEventKind::SignalOff,
                position: Some(pos),
                strength: None,
            },
        }
    }
}

/// Everything one bridge tick produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BridgeTick {
    /// Signal transitions seen this tick.
    pub edges: Vec<DetectedEdge>,
    /// Output strengths to apply this tick.
    pub outputs: Vec<EmissionUpdate>,
}

/// Per-agent signal scanning, cooldowns and emissions.
pub struct EnvironmentalBridge {
    config: BridgeConfig,
    scanner: SignalScanner,
    emissions: EmissionTracker,
    counters: Arc<ParleyCounters>,
}

impl EnvironmentalBridge {
    /// Create a bridge from configuration.
    #[must_use]
    pub fn new(config: BridgeConfig, counters: Arc<ParleyCounters>) -> Self {
        info!(
            enabled = config.enabled,
            radius = config.detection_radius,
            cooldown_ticks = config.cooldown_ticks,
            "Environmental bridge configured"
        );
        Self {
            scanner: SignalScanner::new(config.detection_radius, config.cooldown_ticks),
            emissions: EmissionTracker::new(),
            config,
            counters,
        }
    }

    /// Whether the bridge does anything at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether `tick` is a scan tick.
    #[must_use]
    pub fn is_scan_tick(&self, tick: u64) -> bool {
        tick % self.config.scan_interval_ticks.max(1) == 0
    }

    /// Run one tick: scan (on scan ticks) and advance emissions.
    pub fn tick(&self, tick: u64, agents: &[TrackedAgent], field: &dyn SignalField) -> BridgeTick {
        let mut out = BridgeTick::default();
        if !self.config.enabled {
            return out;
        }

        if self.is_scan_tick(tick) {
            for agent in agents {
                let report = self.scanner.scan(agent.id, agent.position, tick, field);
                for _ in 0..report.suppressed {
                    ParleyCounters::bump(&self.counters.signal_suppressed);
                }
                for edge in report.edges {
                    match edge {
                        SignalEdge::Activated { .. } => ParleyCounters::bump(&self.counters.signal_activations),
                        SignalEdge::Deactivated { .. } => ParleyCounters::bump(&self.counters.signal_deactivations),
                    }
                    debug!(agent = %agent.id, pos = %edge.pos(), ?edge, "Signal edge detected");
                    out.edges.push(DetectedEdge { agent: agent.id, edge });
                }
            }
        }

        out.outputs = self.emissions.advance_all(tick);
        out
    }

    /// Start the emission a story trigger asks for.
    /// Returns whether an emission was started.
    pub fn emit(&self, agent: AgentId, trigger: &StoryTrigger, tick: u64) -> bool {
        if !self.config.enabled || !self.config.emit_on_events || !trigger.emit_signal {
            return false;
        }
        self.start_emission(agent, trigger.strength, u64::from(trigger.duration_ticks), Pattern::from_name(&trigger.pattern), tick);
        true
    }

    /// Start an emission directly, replacing any current one.
    pub fn start_emission(&self, agent: AgentId, strength: u8, duration_ticks: u64, pattern: Pattern, tick: u64) {
        ParleyCounters::bump(&self.counters.emissions_started);
        self.emissions.start(agent, strength, duration_ticks, pattern, tick);
    }

    /// Forget everything about an agent (signal states, cooldown, emission).
    pub fn despawn(&self, agent: AgentId) {
        self.scanner.forget(agent);
        self.emissions.cancel(agent);
        debug!(agent = %agent, "Bridge state cleared");
    }

    /// Signal scanner, for inspection.
    #[must_use]
    pub fn scanner(&self) -> &SignalScanner {
        &self.scanner
    }

    /// Emission tracker, for inspection.
    #[must_use]
    pub fn emissions(&self) -> &EmissionTracker {
        &self.emissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    fn bridge(config: BridgeConfig) -> (EnvironmentalBridge, Arc<ParleyCounters>) {
        let counters = Arc::new(ParleyCounters::new());
        (EnvironmentalBridge::new(config, Arc::clone(&counters)), counters)
    }

    #[test]
    fn scans_only_on_interval() {
        let (bridge, counters) = bridge(BridgeConfig {
            scan_interval_ticks: 5,
            detection_radius: 0,
            cooldown_ticks: 0,
            ..BridgeConfig::default()
        });
        let power = AtomicU8::new(0);
        let field = |_: BlockPos| power.load(Ordering::Relaxed);
        let agents = [TrackedAgent { id: AgentId::new(), position: BlockPos::new(3, 64, 3) }];

        bridge.tick(0, &agents, &field);
        power.store(15, Ordering::Relaxed);
        assert!(bridge.tick(1, &agents, &field).edges.is_empty());
        let tick = bridge.tick(5, &agents, &field);
        assert_eq!(tick.edges.len(), 1);
        assert_eq!(tick.edges[0].to_external_event().kind, ExternalEventKind::SignalOn);
        assert_eq!(counters.snapshot().signal_activations, 1);
    }

    #[test]
    fn disabled_bridge_is_inert() {
        let (bridge, _) = bridge(BridgeConfig {
            enabled: false,
            ..BridgeConfig::default()
        });
        let agent = AgentId::new();
        let trigger = StoryTrigger {
            emit_signal: true,
            ..StoryTrigger::default()
        };
        assert!(!bridge.emit(agent, &trigger, 0));
        let field = |_: BlockPos| 15u8;
        let out = bridge.tick(0, &[TrackedAgent { id: agent, position: BlockPos::default() }], &field);
        assert_eq!(out, BridgeTick::default());
    }

    #[test]
    fn emit_respects_trigger_and_config() {
        let (bridge, counters) = bridge(BridgeConfig::default());
        let agent = AgentId::new();

        assert!(!bridge.emit(agent, &StoryTrigger::default(), 0));

        let trigger = StoryTrigger {
            emit_signal: true,
            strength: 12,
            duration_ticks: 2,
            pattern: "fade".to_string(),
        };
        assert!(bridge.emit(agent, &trigger, 10));
        let field = |_: BlockPos| 0u8;
        let outputs: Vec<u8> = (10..13)
            .flat_map(|t| bridge.tick(t, &[], &field).outputs)
            .map(|u| u.strength)
            .collect();
        assert_eq!(outputs, [12, 6, 0]);
        assert_eq!(counters.snapshot().emissions_started, 1);

        let (quiet, _) = self::bridge(BridgeConfig {
            emit_on_events: false,
            ..BridgeConfig::default()
        });
        assert!(!quiet.emit(agent, &trigger, 0));
    }

    #[test]
    fn despawn_clears_all_state() {
        let (bridge, _) = bridge(BridgeConfig {
            detection_radius: 1,
            ..BridgeConfig::default()
        });
        let agent = AgentId::new();
        let field = |_: BlockPos| 0u8;
        bridge.tick(0, &[TrackedAgent { id: agent, position: BlockPos::default() }], &field);
        bridge.start_emission(agent, 15, 100, Pattern::Constant, 0);

        bridge.despawn(agent);
        assert_eq!(bridge.scanner().tracked_positions(agent), 0);
        assert!(bridge.emissions().current(agent).is_none());
    }
}
