//! Signal edge detection around agents.
//!
//! Each scan visits every position in the cube of `radius` around an agent
//! and compares its powered state with the previous scan. Only transitions
//! are reported:
//!
//! ```text
//! unseen  → any      record silently
//! off     → on       Activated   (dropped inside the agent's cooldown)
//! on      → off      Deactivated (never dropped)
//! ```

use dashmap::DashMap;
use parley_core::types::{AgentId, BlockPos};
use tracing::debug;

/// Read access to signal strengths in the world.
pub trait SignalField: Send + Sync {
    /// Signal strength at `pos` (0 = unpowered).
    fn signal_strength(&self, pos: BlockPos) -> u8;
}

impl<F> SignalField for F
where
    F: Fn(BlockPos) -> u8 + Send + Sync,
{
    fn signal_strength(&self, pos: BlockPos) -> u8 {
        self(pos)
    }
}

/// A transition observed at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEdge {
    /// Unpowered → powered.
    Activated {
        /// Where.
        pos: BlockPos,
        /// Strength observed on activation.
        strength: u8,
    },
    /// Powered → unpowered.
    Deactivated {
        /// Where.
        pos: BlockPos,
    },
}

impl SignalEdge {
    /// Position of the transition.
    #[must_use]
    pub fn pos(&self) -> BlockPos {
        match *self {
            Self::Activated { pos, .. } | Self::Deactivated { pos } => pos,
        }
    }
}

/// Result of scanning around one agent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Edges to deliver, in scan order.
    pub edges: Vec<SignalEdge>,
    /// Activations dropped by the cooldown.
    pub suppressed: usize,
}

/// Per-agent signal state and activation cooldowns.
pub struct SignalScanner {
    states: DashMap<(AgentId, BlockPos), bool>,
    last_activation: DashMap<AgentId, u64>,
    radius: i32,
    cooldown_ticks: u64,
}

impl SignalScanner {
    /// Create a scanner over a cube of half-width `radius`.
    #[must_use]
    pub fn new(radius: u32, cooldown_ticks: u64) -> Self {
        Self {
            states: DashMap::new(),
            last_activation: DashMap::new(),
            radius: i32::try_from(radius).unwrap_or(i32::MAX),
            cooldown_ticks,
        }
    }

    /// Scan the neighbourhood of one agent at `tick`.
    pub fn scan(&self, agent: AgentId, center: BlockPos, tick: u64, field: &dyn SignalField) -> ScanReport {
        let mut report = ScanReport::default();
        let r = self.radius;

        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    let pos = center.offset(dx, dy, dz);
                    let strength = field.signal_strength(pos);
                    let powered = strength > 0;

                    let Some(was_powered) = self.states.insert((agent, pos), powered) else {
                        continue;
                    };

                    match (was_powered, powered) {
                        (false, true) => {
                            if self.in_cooldown(agent, tick) {
                                debug!(agent = %agent, pos = %pos, "Signal activation suppressed by cooldown");
                                report.suppressed += 1;
                            } else {
                                self.last_activation.insert(agent, tick);
                                report.edges.push(SignalEdge::Activated { pos, strength });
                            }
                        }
                        (true, false) => report.edges.push(SignalEdge::Deactivated { pos }),
                        _ => {}
                    }
                }
            }
        }
        report
    }

    fn in_cooldown(&self, agent: AgentId, tick: u64) -> bool {
        self.last_activation
            .get(&agent)
            .is_some_and(|last| tick.saturating_sub(*last) < self.cooldown_ticks)
    }

    /// Drop all state for an agent.
    pub fn forget(&self, agent: AgentId) {
        self.states.retain(|(owner, _), _| *owner != agent);
        self.last_activation.remove(&agent);
    }

    /// Positions currently tracked for an agent.
    #[must_use]
    pub fn tracked_positions(&self, agent: AgentId) -> usize {
        self.states.iter().filter(|entry| entry.key().0 == agent).count()
    }

    /// Tick of the agent's last accepted activation.
    #[must_use]
    pub fn last_activation(&self, agent: AgentId) -> Option<u64> {
        self.last_activation.get(&agent).map(|tick| *tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Settable world of signal strengths; everything else is unpowered.
    #[derive(Default)]
    struct Grid(Mutex<HashMap<BlockPos, u8>>);

    impl Grid {
        fn set(&self, pos: BlockPos, strength: u8) {
            self.0.lock().insert(pos, strength);
        }
    }

    impl SignalField for Grid {
        fn signal_strength(&self, pos: BlockPos) -> u8 {
            self.0.lock().get(&pos).copied().unwrap_or(0)
        }
    }

    #[test]
    fn off_on_off_yields_one_activation_and_one_deactivation() {
        let scanner = SignalScanner::new(2, 40);
        let grid = Grid::default();
        let agent = AgentId::new();
        let lever = BlockPos::new(1, 0, -1);

        assert!(scanner.scan(agent, BlockPos::new(0, 0, 0), 0, &grid).edges.is_empty());

        grid.set(lever, 13);
        let report = scanner.scan(agent, BlockPos::new(0, 0, 0), 1, &grid);
        assert_eq!(report.edges, vec![SignalEdge::Activated { pos: lever, strength: 13 }]);

        grid.set(lever, 0);
        let report = scanner.scan(agent, BlockPos::new(0, 0, 0), 2, &grid);
        assert_eq!(report.edges, vec![SignalEdge::Deactivated { pos: lever }]);
    }

    #[test]
    fn already_powered_position_is_not_reported() {
        let scanner = SignalScanner::new(1, 0);
        let grid = Grid::default();
        grid.set(BlockPos::new(0, 1, 0), 15);
        let agent = AgentId::new();

        let first = scanner.scan(agent, BlockPos::new(0, 0, 0), 0, &grid);
        let second = scanner.scan(agent, BlockPos::new(0, 0, 0), 1, &grid);
        assert!(first.edges.is_empty());
        assert!(second.edges.is_empty());
        assert_eq!(scanner.tracked_positions(agent), 27);
    }

    #[test]
    fn cooldown_drops_activations_but_not_deactivations() {
        let scanner = SignalScanner::new(1, 40);
        let grid = Grid::default();
        let agent = AgentId::new();
        let a = BlockPos::new(1, 0, 0);
        let b = BlockPos::new(-1, 0, 0);
        let origin = BlockPos::new(0, 0, 0);

        scanner.scan(agent, origin, 0, &grid);
        grid.set(a, 15);
        assert_eq!(scanner.scan(agent, origin, 10, &grid).edges.len(), 1);

        // Second activation inside the window is dropped, the falling edge is not.
        grid.set(a, 0);
        grid.set(b, 15);
        let report = scanner.scan(agent, origin, 20, &grid);
        assert_eq!(report.edges, vec![SignalEdge::Deactivated { pos: a }]);
        assert_eq!(report.suppressed, 1);

        // The suppressed position is now recorded as powered; a fresh edge
        // after the window is reported.
        grid.set(b, 0);
        scanner.scan(agent, origin, 30, &grid);
        grid.set(b, 4);
        let report = scanner.scan(agent, origin, 50, &grid);
        assert_eq!(report.edges, vec![SignalEdge::Activated { pos: b, strength: 4 }]);
        assert_eq!(scanner.last_activation(agent), Some(50));
    }

    #[test]
    fn agents_do_not_share_state() {
        let scanner = SignalScanner::new(0, 100);
        let grid = Grid::default();
        let (first, second) = (AgentId::new(), AgentId::new());
        let origin = BlockPos::new(0, 0, 0);

        scanner.scan(first, origin, 0, &grid);
        scanner.scan(second, origin, 0, &grid);
        grid.set(origin, 8);
        assert_eq!(scanner.scan(first, origin, 1, &grid).edges.len(), 1);
        assert_eq!(scanner.scan(second, origin, 1, &grid).edges.len(), 1);

        scanner.forget(first);
        assert_eq!(scanner.tracked_positions(first), 0);
        assert_eq!(scanner.last_activation(first), None);
        assert_eq!(scanner.tracked_positions(second), 1);
    }
}
