//! Daily cost tracking and the validation-count ceiling.
//!
//! Budget state lives in the state repository; reservations are atomic
//! check-and-increments so two concurrent validations cannot jointly exceed
//! the budget. Actual spend is committed immediately after each external
//! call, so a partially-run pipeline still reflects real spend.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::domain::errors::HealResult;
use crate::domain::models::{Budget, BudgetConfig, SafetyCategory};
use crate::domain::ports::StateRepository;

pub struct CostTracker {
    state: Arc<dyn StateRepository>,
    config: BudgetConfig,
}

impl CostTracker {
    pub fn new(state: Arc<dyn StateRepository>, config: BudgetConfig) -> Self {
        Self { state, config }
    }

    /// Estimated cost of validating a fix in this tier: one judge-equivalent
    /// per judge, plus the fixed lookup cost.
    pub fn estimate_cost(&self, category: SafetyCategory) -> f64 {
        category.judge_count() as f64 * self.config.judge_cost_usd + self.config.lookup_cost_usd
    }

    /// Hard preflight gate. Atomically reserves the estimate and one
    /// validation slot; `false` means the budget or ceiling is exhausted.
    pub async fn can_validate(&self, category: SafetyCategory) -> HealResult<bool> {
        let estimate = self.estimate_cost(category);
        let today = Utc::now().date_naive();
        let reserved = self
            .state
            .reserve_budget(today, estimate, &self.config)
            .await?;
        debug!(category = category.as_str(), estimate, reserved, "budget reservation");
        Ok(reserved)
    }

    /// Reconcile a reservation against what the stage actually spent.
    /// Negative deltas refund over-reservation.
    pub async fn commit_actual(&self, reserved_usd: f64, actual_usd: f64) -> HealResult<()> {
        let delta = actual_usd - reserved_usd;
        if delta.abs() < f64::EPSILON {
            return Ok(());
        }
        self.state.commit_spend(Utc::now().date_naive(), delta).await
    }

    /// Cost of the votes actually cast.
    pub fn vote_cost(&self, votes_cast: usize) -> f64 {
        votes_cast as f64 * self.config.judge_cost_usd + self.config.lookup_cost_usd
    }

    pub async fn snapshot(&self) -> HealResult<Budget> {
        self.state
            .load_budget(Utc::now().date_naive(), &self.config)
            .await
    }
}
