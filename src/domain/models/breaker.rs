//! Circuit breaker state.
//!
//! One state row per project, persisted so a restart cannot silently reset
//! protection. Mutations go through compare-and-set on the version column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    /// Auto-healing enabled.
    Closed,
    /// Tripped: all auto-fix blocked until the cooldown elapses.
    Open,
    /// Cooldown elapsed: exactly one probe fix is admitted.
    HalfOpen,
}

impl Default for BreakerStatus {
    fn default() -> Self {
        Self::Closed
    }
}

impl BreakerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "closed" => Some(Self::Closed),
            "open" => Some(Self::Open),
            "half_open" => Some(Self::HalfOpen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub project_id: String,
    pub status: BreakerStatus,
    /// Timestamps of recent reverts; pruned lazily against the rolling window.
    pub recent_reverts: Vec<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    /// The half-open probe slot has been claimed.
    pub probe_in_flight: bool,
    /// Optimistic-lock version for compare-and-set persistence.
    pub version: i64,
}

impl CircuitBreakerState {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            status: BreakerStatus::Closed,
            recent_reverts: Vec::new(),
            opened_at: None,
            probe_in_flight: false,
            version: 0,
        }
    }

    /// Drop reverts older than the rolling window.
    pub fn prune_reverts(&mut self, now: DateTime<Utc>, window_secs: u64) {
        let cutoff = now - chrono::Duration::seconds(window_secs as i64);
        self.recent_reverts.retain(|t| *t > cutoff);
    }
}
