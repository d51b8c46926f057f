//! Execution statistics
//!
//! Counts validated, blocked and timed-out commands and tracks how many
//! execution timers are currently armed. The armed-timer gauge is driven by
//! [`TimerGuard`], so a timer can only be cleared once.

mod metrics;


pub use metrics::{Counter, Gauge};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared statistics collector
pub type SharedStats = Arc<StatsCollector>;

/// Collector for command statistics
#[derive(Debug)]
pub struct StatsCollector {
    pub commands_executed: Counter,
    pub commands_blocked: Counter,
    pub timeouts: Counter,
    active_timeouts: Gauge,
    started_at: DateTime<Utc>,
}

impl StatsCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self {
            commands_executed: Counter::new("commands_executed_total"),
            commands_blocked: Counter::new("commands_blocked_total"),
            timeouts: Counter::new("command_timeouts_total"),
            active_timeouts: Gauge::new("command_timers_active"),
            started_at: Utc::now(),
        }
    }

    /// Create a shared (Arc-wrapped) collector
    pub fn shared() -> SharedStats {
        Arc::new(Self::new())
    }

    /// Arm an execution timer. The gauge drops back when the guard is dropped.
    pub fn arm_timer(self: &Arc<Self>) -> TimerGuard {
        self.active_timeouts.inc();
        TimerGuard {
            stats: Arc::clone(self),
        }
    }

    /// Number of currently armed timers
    pub fn active_timeouts(&self) -> u64 {
        self.active_timeouts.get().max(0) as u64
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Seconds since the collector was created
    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Fraction of validated commands that were blocked
    pub fn block_rate(&self) -> f64 {
        let blocked = self.commands_blocked.get();
        let total = self.commands_executed.get() + blocked;
        if total == 0 {
            0.0
        } else {
            blocked as f64 / total as f64
        }
    }

    /// Zero the counters. Armed timers belong to live executions and are kept.
    pub fn reset(&self) {
        self.commands_executed.reset();
        self.commands_blocked.reset();
        self.timeouts.reset();
    }

    /// Point-in-time view of all statistics
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commands_executed: self.commands_executed.get(),
            commands_blocked: self.commands_blocked.get(),
            timeouts: self.timeouts.get(),
            active_timeouts: self.active_timeouts(),
            block_rate: self.block_rate(),
            uptime_secs: self.uptime_secs(),
            started_at: self.started_at,
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Armed execution timer. Dropping it clears the timer.
#[derive(Debug)]
pub struct TimerGuard {
    stats: SharedStats,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.stats.active_timeouts.dec();
    }
}

/// Serializable statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub commands_executed: u64,
    pub commands_blocked: u64,
    pub timeouts: u64,
    pub active_timeouts: u64,
    pub block_rate: f64,
    pub uptime_secs: u64,
    pub started_at: DateTime<Utc>,
}
