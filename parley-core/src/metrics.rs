//! Runtime counters and tick timing.
//!
//! Every Parley subsystem emits `tracing` events; this module adds
//! lock-free counters that can be read at runtime or exported as
//! Prometheus text, plus a tick-budget monitor for the world tick.
//!
//! Counters are `AtomicU64` with relaxed ordering. The tick history uses
//! `parking_lot::Mutex` since it is only read on export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Counters (lock-free)
// ---------------------------------------------------------------------------

/// Atomic counters for conversation, bridge and webhook events.
pub struct ParleyCounters {
    /// Chat requests submitted by players.
    pub chats_requested: AtomicU64,
    /// Requests rejected because the agent was still thinking.
    pub chats_rejected_busy: AtomicU64,
    /// Requests rejected by the per-pair rate limit.
    pub chats_rate_limited: AtomicU64,
    /// Requests that produced a real reply.
    pub chats_completed: AtomicU64,
    /// Requests that degraded to a sentinel reply.
    pub chats_failed: AtomicU64,
    /// Rising signal edges forwarded to agents.
    pub signal_activations: AtomicU64,
    /// Rising edges dropped by the cooldown gate.
    pub signal_suppressed: AtomicU64,
    /// Falling signal edges forwarded to agents.
    pub signal_deactivations: AtomicU64,
    /// Emissions started from story events.
    pub emissions_started: AtomicU64,
    /// Webhooks delivered with a 2xx response.
    pub webhooks_sent: AtomicU64,
    /// Webhooks that failed (transport error or non-2xx).
    pub webhooks_failed: AtomicU64,
    /// Conversation records written to disk.
    pub conversations_saved: AtomicU64,
    /// Conversation records restored from disk.
    pub conversations_loaded: AtomicU64,
}

impl ParleyCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chats_requested: AtomicU64::new(0),
            chats_rejected_busy: AtomicU64::new(0),
            chats_rate_limited: AtomicU64::new(0),
            chats_completed: AtomicU64::new(0),
            chats_failed: AtomicU64::new(0),
            signal_activations: AtomicU64::new(0),
            signal_suppressed: AtomicU64::new(0),
            signal_deactivations: AtomicU64::new(0),
            emissions_started: AtomicU64::new(0),
            webhooks_sent: AtomicU64::new(0),
            webhooks_failed: AtomicU64::new(0),
            conversations_saved: AtomicU64::new(0),
            conversations_loaded: AtomicU64::new(0),
        }
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            chats_requested: self.chats_requested.load(Ordering::Relaxed),
            chats_rejected_busy: self.chats_rejected_busy.load(Ordering::Relaxed),
            chats_rate_limited: self.chats_rate_limited.load(Ordering::Relaxed),
            chats_completed: self.chats_completed.load(Ordering::Relaxed),
            chats_failed: self.chats_failed.load(Ordering::Relaxed),
            signal_activations: self.signal_activations.load(Ordering::Relaxed),
            signal_suppressed: self.signal_suppressed.load(Ordering::Relaxed),
            signal_deactivations: self.signal_deactivations.load(Ordering::Relaxed),
            emissions_started: self.emissions_started.load(Ordering::Relaxed),
            webhooks_sent: self.webhooks_sent.load(Ordering::Relaxed),
            webhooks_failed: self.webhooks_failed.load(Ordering::Relaxed),
            conversations_saved: self.conversations_saved.load(Ordering::Relaxed),
            conversations_loaded: self.conversations_loaded.load(Ordering::Relaxed),
        }
    }
}

impl Default for ParleyCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Chat requests submitted.
    pub chats_requested: u64,
    /// Rejected while thinking.
    pub chats_rejected_busy: u64,
    /// Rejected by rate limit.
    pub chats_rate_limited: u64,
    /// Real replies.
    pub chats_completed: u64,
    /// Sentinel replies.
    pub chats_failed: u64,
    /// Forwarded activations.
    pub signal_activations: u64,
    /// Suppressed activations.
    pub signal_suppressed: u64,
    /// Forwarded deactivations.
    pub signal_deactivations: u64,
    /// Emissions started.
    pub emissions_started: u64,
    /// Delivered webhooks.
    pub webhooks_sent: u64,
    /// Failed webhooks.
    pub webhooks_failed: u64,
    /// Saved records.
    pub conversations_saved: u64,
    /// Loaded records.
    pub conversations_loaded: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, String); 8] = [
            (
                "parley_chats_total",
                "Chat requests by outcome",
                format!(
                    "parley_chats_total{{outcome=\"requested\"}} {}\n\
                     parley_chats_total{{outcome=\"busy\"}} {}\n\
                     parley_chats_total{{outcome=\"rate_limited\"}} {}\n\
                     parley_chats_total{{outcome=\"completed\"}} {}\n\
                     parley_chats_total{{outcome=\"failed\"}} {}\n",
                    self.chats_requested,
                    self.chats_rejected_busy,
                    self.chats_rate_limited,
                    self.chats_completed,
                    self.chats_failed,
                ),
            ),
            (
                "parley_signal_activations_total",
                "Rising signal edges forwarded to agents",
                format!("parley_signal_activations_total {}\n", self.signal_activations),
            ),
            (
                "parley_signal_suppressed_total",
                "Rising signal edges dropped by cooldown",
                format!("parley_signal_suppressed_total {}\n", self.signal_suppressed),
            ),
            (
                "parley_signal_deactivations_total",
                "Falling signal edges forwarded to agents",
                format!("parley_signal_deactivations_total {}\n", self.signal_deactivations),
            ),
            (
                "parley_emissions_started_total",
                "Output signal emissions started",
                format!("parley_emissions_started_total {}\n", self.emissions_started),
            ),
            (
                "parley_webhooks_total",
                "Webhook deliveries by result",
                format!(
                    "parley_webhooks_total{{result=\"sent\"}} {}\n\
                     parley_webhooks_total{{result=\"failed\"}} {}\n",
                    self.webhooks_sent, self.webhooks_failed,
                ),
            ),
            (
                "parley_conversations_saved_total",
                "Conversation records written",
                format!("parley_conversations_saved_total {}\n", self.conversations_saved),
            ),
            (
                "parley_conversations_loaded_total",
                "Conversation records restored",
                format!("parley_conversations_loaded_total {}\n", self.conversations_loaded),
            ),
        ];

        let mut out = String::new();
        for (name, help, body) in rows {
            out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} counter\n"));
            out.push_str(&body);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tick Budget Monitor
// ---------------------------------------------------------------------------

const HISTORY_LEN: usize = 256;

/// Tracks time spent in each world tick (scan + emission + dispatch).
pub struct TickBudgetMonitor {
    budget_ms: f64,
    history: Mutex<TickHistory>,
}

struct TickHistory {
    timings: Vec<f64>,
    write_idx: usize,
    count: u64,
    last_over_budget: bool,
}

impl TickBudgetMonitor {
    /// Create a monitor with the given per-tick budget (milliseconds).
    #[must_use]
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            history: Mutex::new(TickHistory {
                timings: vec![0.0; HISTORY_LEN],
                write_idx: 0,
                count: 0,
                last_over_budget: false,
            }),
        }
    }

    /// Begin timing a tick. The guard records elapsed time on drop.
    pub fn begin_tick(&self) -> TickGuard<'_> {
        TickGuard {
            monitor: self,
            start: Instant::now(),
        }
    }

    /// Record a tick timing manually (milliseconds).
    pub fn record(&self, ms: f64) {
        let mut h = self.history.lock();
        let idx = h.write_idx;
        h.timings[idx] = ms;
        h.write_idx = (idx + 1) % HISTORY_LEN;
        h.count += 1;
        h.last_over_budget = ms > self.budget_ms;
    }

    /// Timing of the most recent tick, or 0 if none was recorded.
    #[must_use]
    pub fn last_tick_ms(&self) -> f64 {
        let h = self.history.lock();
        if h.count == 0 {
            return 0.0;
        }
        let idx = (h.write_idx + HISTORY_LEN - 1) % HISTORY_LEN;
        h.timings[idx]
    }

    /// Whether the most recent tick exceeded the budget.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.history.lock().last_over_budget
    }

    /// Mean over the retained history.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn mean_ms(&self) -> f64 {
        let h = self.history.lock();
        let n = (h.count as usize).min(HISTORY_LEN);
        if n == 0 {
            return 0.0;
        }
        h.timings[..n].iter().sum::<f64>() / n as f64
    }

    /// Total number of ticks recorded.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.history.lock().count
    }

    /// The configured budget in milliseconds.
    #[must_use]
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }
}

/// RAII guard that records elapsed time when dropped.
pub struct TickGuard<'a> {
    monitor: &'a TickBudgetMonitor,
    start: Instant,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.monitor.record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Span names used with `tracing::span!`.
pub mod spans {
    /// One world tick.
    pub const WORLD_TICK: &str = "parley::tick";
    /// Signal edge scan.
    pub const SIGNAL_SCAN: &str = "parley::bridge::scan";
    /// One chat dispatch to a provider.
    pub const CHAT: &str = "parley::llm::chat";
    /// Conversation save pass.
    pub const PERSIST_SAVE: &str = "parley::persist::save";
    /// Conversation load pass.
    pub const PERSIST_LOAD: &str = "parley::persist::load";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
