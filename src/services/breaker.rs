//! Circuit breaker: trips auto-healing off after repeated reverts and
//! probes recovery through a half-open state.
//!
//! State is persisted per project through the state repository, so a
//! restart cannot silently reset protection. Every transition is a
//! compare-and-set; on sustained contention the breaker answers
//! conservatively (deny).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::{BreakerConfig, BreakerStatus, CircuitBreakerState};
use crate::domain::ports::StateRepository;

const CAS_RETRIES: usize = 3;

/// Outcome of asking the breaker whether a fix may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixAllowance {
    /// Breaker closed: proceed normally.
    Allowed,
    /// Breaker half-open: this caller holds the single probe slot.
    Probe,
    /// Breaker open (or probe already claimed): no auto-fix.
    Denied,
}

impl FixAllowance {
    pub fn permitted(&self) -> bool {
        !matches!(self, Self::Denied)
    }
}

pub struct CircuitBreaker {
    state: Arc<dyn StateRepository>,
    config: BreakerConfig,
    project_id: String,
}

impl CircuitBreaker {
    pub fn new(
        state: Arc<dyn StateRepository>,
        config: BreakerConfig,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            state,
            config,
            project_id: project_id.into(),
        }
    }

    /// Whether an auto-fix may proceed right now. OPEN transitions to
    /// HALF_OPEN once the cooldown elapses, and the transition itself claims
    /// the single probe slot for this caller.
    pub async fn should_allow_fix(&self) -> HealResult<FixAllowance> {
        self.should_allow_fix_at(Utc::now()).await
    }

    pub async fn should_allow_fix_at(&self, now: DateTime<Utc>) -> HealResult<FixAllowance> {
        for _ in 0..CAS_RETRIES {
            let mut state = self.state.load_breaker(&self.project_id).await?;
            state.prune_reverts(now, self.config.revert_window_secs);

            match state.status {
                BreakerStatus::Closed => return Ok(FixAllowance::Allowed),
                BreakerStatus::Open => {
                    let cooldown_over = state.opened_at.is_none_or(|opened| {
                        now - opened >= Duration::seconds(self.config.cooldown_secs as i64)
                    });
                    if !cooldown_over {
                        return Ok(FixAllowance::Denied);
                    }
                    state.status = BreakerStatus::HalfOpen;
                    state.probe_in_flight = true;
                    if self.state.store_breaker(&state).await? {
                        info!(project = %self.project_id, "circuit breaker half-open, admitting probe");
                        return Ok(FixAllowance::Probe);
                    }
                    // Lost the race; reload and re-evaluate.
                }
                BreakerStatus::HalfOpen => {
                    if state.probe_in_flight {
                        return Ok(FixAllowance::Denied);
                    }
                    state.probe_in_flight = true;
                    if self.state.store_breaker(&state).await? {
                        return Ok(FixAllowance::Probe);
                    }
                }
            }
        }
        warn!(project = %self.project_id, "breaker CAS contention, denying fix");
        Ok(FixAllowance::Denied)
    }

    /// Record a revert. Trips the breaker once the threshold is reached
    /// inside the rolling window.
    pub async fn record_revert(&self) -> HealResult<BreakerStatus> {
        self.record_revert_at(Utc::now()).await
    }

    pub async fn record_revert_at(&self, now: DateTime<Utc>) -> HealResult<BreakerStatus> {
        for _ in 0..CAS_RETRIES {
            let mut state = self.state.load_breaker(&self.project_id).await?;
            state.prune_reverts(now, self.config.revert_window_secs);
            state.recent_reverts.push(now);

            if state.status != BreakerStatus::Open
                && state.recent_reverts.len() >= self.config.revert_threshold
            {
                state.status = BreakerStatus::Open;
                state.opened_at = Some(now);
                state.probe_in_flight = false;
                warn!(
                    project = %self.project_id,
                    reverts = state.recent_reverts.len(),
                    "circuit breaker tripped open"
                );
            }

            if self.state.store_breaker(&state).await? {
                return Ok(state.status);
            }
        }
        Err(HealError::Database(
            "circuit breaker state contention on record_revert".to_string(),
        ))
    }

    /// Report the half-open probe's outcome: success closes the breaker,
    /// failure re-opens it and restarts the cooldown.
    pub async fn record_probe_result(&self, success: bool) -> HealResult<BreakerStatus> {
        self.record_probe_result_at(success, Utc::now()).await
    }

    pub async fn record_probe_result_at(
        &self,
        success: bool,
        now: DateTime<Utc>,
    ) -> HealResult<BreakerStatus> {
        for _ in 0..CAS_RETRIES {
            let mut state = self.state.load_breaker(&self.project_id).await?;
            if state.status != BreakerStatus::HalfOpen {
                return Ok(state.status);
            }
            if success {
                state.status = BreakerStatus::Closed;
                state.recent_reverts.clear();
                state.opened_at = None;
                info!(project = %self.project_id, "probe fix succeeded, circuit breaker closed");
            } else {
                state.status = BreakerStatus::Open;
                state.opened_at = Some(now);
                warn!(project = %self.project_id, "probe fix failed, circuit breaker re-opened");
            }
            state.probe_in_flight = false;
            if self.state.store_breaker(&state).await? {
                return Ok(state.status);
            }
        }
        Err(HealError::Database(
            "circuit breaker state contention on record_probe_result".to_string(),
        ))
    }

    /// Current state with lazily pruned reverts (read-only).
    pub async fn current_state(&self) -> HealResult<CircuitBreakerState> {
        let mut state = self.state.load_breaker(&self.project_id).await?;
        state.prune_reverts(Utc::now(), self.config.revert_window_secs);
        Ok(state)
    }
}
