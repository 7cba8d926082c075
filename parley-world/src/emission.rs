//! Active output-signal emissions, at most one per agent.

use dashmap::DashMap;
use parley_core::types::AgentId;
use tracing::debug;

use crate::pattern::{Pattern, MAX_STRENGTH};

/// An emission in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emission {
    /// Base strength (clamped to [`MAX_STRENGTH`]).
    pub strength: u8,
    /// Total length in ticks.
    pub duration_ticks: u64,
    /// Shape over time.
    pub pattern: Pattern,
    /// Tick the emission started on.
    pub started_at: u64,
}

impl Emission {
    /// Ticks since the start, or 0 if `tick` precedes it.
    #[must_use]
    pub fn elapsed(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.started_at)
    }
}

/// Output strength an agent should present this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionUpdate {
    /// Emitting agent.
    pub agent: AgentId,
    /// Strength to output.
    pub strength: u8,
    /// The emission just ended; strength is 0 and it will not be reported again.
    pub finished: bool,
}

/// Tracks the active emission of every agent.
#[derive(Default)]
pub struct EmissionTracker {
    active: DashMap<AgentId, Emission>,
}

impl EmissionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an emission, replacing any existing one for the agent.
    /// Returns the replaced emission.
    pub fn start(&self, agent: AgentId, strength: u8, duration_ticks: u64, pattern: Pattern, tick: u64) -> Option<Emission> {
        let emission = Emission {
            strength: strength.min(MAX_STRENGTH),
            duration_ticks,
            pattern,
            started_at: tick,
        };
        debug!(agent = %agent, pattern = %pattern, strength = emission.strength, duration_ticks, "Emission started");
        self.active.insert(agent, emission)
    }

    /// Recompute one agent's output for `tick`.
    ///
    /// Returns `None` when the agent has no emission. An emission whose
    /// duration has elapsed is removed and reported once with strength 0.
    pub fn advance(&self, agent: AgentId, tick: u64) -> Option<EmissionUpdate> {
        let (strength, finished) = {
            let emission = self.active.get(&agent)?;
            let elapsed = emission.elapsed(tick);
            if elapsed >= emission.duration_ticks {
                (0, true)
            } else {
                let strength = emission
                    .pattern
                    .strength(emission.strength, emission.duration_ticks, elapsed);
                (strength, false)
            }
        };

        if finished {
            self.active.remove(&agent);
            debug!(agent = %agent, "Emission finished");
        }
        Some(EmissionUpdate {
            agent,
            strength,
            finished,
        })
    }

    /// Advance every active emission.
    pub fn advance_all(&self, tick: u64) -> Vec<EmissionUpdate> {
        let agents: Vec<AgentId> = self.active.iter().map(|entry| *entry.key()).collect();
        agents
            .into_iter()
            .filter_map(|agent| self.advance(agent, tick))
            .collect()
    }

    /// Stop an agent's emission without reporting it. Returns whether one was active.
    pub fn cancel(&self, agent: AgentId) -> bool {
        self.active.remove(&agent).is_some()
    }

    /// The agent's current emission.
    #[must_use]
    pub fn current(&self, agent: AgentId) -> Option<Emission> {
        self.active.get(&agent).map(|e| *e)
    }

    /// Number of agents emitting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether nothing is emitting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
