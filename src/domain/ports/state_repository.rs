//! Persistent shared state: circuit breaker and daily budget.
//!
//! Both are shared mutable resources touched by concurrent fix attempts, so
//! every mutation is a compare-and-set or a single-statement
//! check-and-increment against the backing store.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::errors::HealResult;
use crate::domain::models::{Budget, BudgetConfig, CircuitBreakerState};

#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Load the breaker state for a project, creating a fresh CLOSED row on
    /// first access.
    async fn load_breaker(&self, project_id: &str) -> HealResult<CircuitBreakerState>;

    /// Compare-and-set store. Returns `false` when the stored version no
    /// longer matches `state.version` (another writer won); the caller
    /// reloads and retries or takes the conservative path.
    async fn store_breaker(&self, state: &CircuitBreakerState) -> HealResult<bool>;

    /// Atomically reserve `estimate_usd` plus one validation slot against
    /// the day's budget. Returns `false` without reserving when either the
    /// spend limit or the validation ceiling would be exceeded.
    async fn reserve_budget(
        &self,
        date: NaiveDate,
        estimate_usd: f64,
        limits: &BudgetConfig,
    ) -> HealResult<bool>;

    /// Adjust the day's spend by the difference between actual and reserved
    /// cost. Negative deltas refund over-reservation.
    async fn commit_spend(&self, date: NaiveDate, delta_usd: f64) -> HealResult<()>;

    /// Budget snapshot for the day (zeroed if nothing recorded yet).
    async fn load_budget(&self, date: NaiveDate, limits: &BudgetConfig) -> HealResult<Budget>;
}
