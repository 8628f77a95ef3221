//! Agent clock: owns the notion of "now" and the cycle counter.
//!
//! RULE: core code never calls `Utc::now()` directly. Every time window
//! (24h active window, 24–48h follow-up, 7-day learning) is measured
//! against `AgentClock::now()`, so tests can move time by hand.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentClock {
    pub mode:          ClockMode,
    pub current_cycle: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClockMode {
    /// Wall-clock time.
    System,
    /// Frozen time, moved only by `advance`.
    Manual { at: DateTime<Utc> },
}

impl AgentClock {
    pub fn system() -> Self {
        Self { mode: ClockMode::System, current_cycle: 0 }
    }

    pub fn manual(at: DateTime<Utc>) -> Self {
        Self { mode: ClockMode::Manual { at }, current_cycle: 0 }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match &self.mode {
            ClockMode::System => Utc::now(),
            ClockMode::Manual { at } => *at,
        }
    }

    /// Move a manual clock forward. No-op on the system clock.
    pub fn advance(&mut self, by: Duration) {
        if let ClockMode::Manual { at } = &mut self.mode {
            *at += by;
        }
    }

    /// Start the next cycle. Returns the new cycle number.
    pub fn next_cycle(&mut self) -> u64 {
        self.current_cycle += 1;
        self.current_cycle
    }
}

/// Epoch milliseconds, the on-disk timestamp form.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
