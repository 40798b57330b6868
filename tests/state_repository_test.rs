//! Shared-state repository tests: breaker CAS and budget atomicity.

mod common;

use chrono::Utc;

use common::test_pool;
use mender::adapters::sqlite::SqliteStateRepository;
use mender::domain::models::{BreakerStatus, BudgetConfig};
use mender::domain::ports::StateRepository;

fn limits() -> BudgetConfig {
    BudgetConfig {
        daily_limit_usd: 1.0,
        max_validations_per_day: 3,
        judge_cost_usd: 0.05,
        lookup_cost_usd: 0.01,
    }
}

#[tokio::test]
async fn breaker_state_persists_across_loads() {
    let pool = test_pool().await;
    let repo = SqliteStateRepository::new(pool);

    let mut state = repo.load_breaker("proj").await.unwrap();
    assert_eq!(state.status, BreakerStatus::Closed);

    state.status = BreakerStatus::Open;
    state.opened_at = Some(Utc::now());
    state.recent_reverts = vec![Utc::now(), Utc::now()];
    assert!(repo.store_breaker(&state).await.unwrap());

    // A fresh load (as after a restart) still sees the protection.
    let reloaded = repo.load_breaker("proj").await.unwrap();
    assert_eq!(reloaded.status, BreakerStatus::Open);
    assert_eq!(reloaded.recent_reverts.len(), 2);
    assert_eq!(reloaded.version, state.version + 1);
}

#[tokio::test]
async fn stale_breaker_writes_lose_the_cas_race() {
    let pool = test_pool().await;
    let repo = SqliteStateRepository::new(pool);

    let first = repo.load_breaker("proj").await.unwrap();
    let mut winner = first.clone();
    winner.status = BreakerStatus::Open;
    assert!(repo.store_breaker(&winner).await.unwrap());

    // A writer still holding the old version must fail.
    let mut stale = first;
    stale.status = BreakerStatus::HalfOpen;
    assert!(!repo.store_breaker(&stale).await.unwrap());

    let stored = repo.load_breaker("proj").await.unwrap();
    assert_eq!(stored.status, BreakerStatus::Open);
}

#[tokio::test]
async fn breaker_states_are_scoped_per_project() {
    let pool = test_pool().await;
    let repo = SqliteStateRepository::new(pool);

    let mut a = repo.load_breaker("a").await.unwrap();
    a.status = BreakerStatus::Open;
    assert!(repo.store_breaker(&a).await.unwrap());

    let b = repo.load_breaker("b").await.unwrap();
    assert_eq!(b.status, BreakerStatus::Closed);
}

#[tokio::test]
async fn budget_reservation_is_a_hard_gate() {
    let pool = test_pool().await;
    let repo = SqliteStateRepository::new(pool);
    let today = Utc::now().date_naive();
    let limits = limits();

    // 1.0 limit admits exactly two 0.4 reservations.
    assert!(repo.reserve_budget(today, 0.4, &limits).await.unwrap());
    assert!(repo.reserve_budget(today, 0.4, &limits).await.unwrap());
    assert!(!repo.reserve_budget(today, 0.4, &limits).await.unwrap());

    let budget = repo.load_budget(today, &limits).await.unwrap();
    assert!((budget.spent_usd - 0.8).abs() < 1e-9);
    assert_eq!(budget.validations_today, 2);
}

#[tokio::test]
async fn validation_ceiling_is_enforced_independently() {
    let pool = test_pool().await;
    let repo = SqliteStateRepository::new(pool);
    let today = Utc::now().date_naive();
    let limits = limits();

    for _ in 0..3 {
        assert!(repo.reserve_budget(today, 0.01, &limits).await.unwrap());
    }
    // Budget remains, but the count ceiling is reached.
    assert!(!repo.reserve_budget(today, 0.01, &limits).await.unwrap());
}

#[tokio::test]
async fn commit_spend_reconciles_reservations() {
    let pool = test_pool().await;
    let repo = SqliteStateRepository::new(pool);
    let today = Utc::now().date_naive();
    let limits = limits();

    assert!(repo.reserve_budget(today, 0.5, &limits).await.unwrap());
    // The stage actually spent less; refund the difference.
    repo.commit_spend(today, -0.3).await.unwrap();

    let budget = repo.load_budget(today, &limits).await.unwrap();
    assert!((budget.spent_usd - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn budgets_reset_by_date() {
    let pool = test_pool().await;
    let repo = SqliteStateRepository::new(pool);
    let limits = limits();
    let today = Utc::now().date_naive();
    let yesterday = today.pred_opt().unwrap();

    assert!(repo.reserve_budget(yesterday, 0.9, &limits).await.unwrap());
    let fresh = repo.load_budget(today, &limits).await.unwrap();
    assert!((fresh.spent_usd - 0.0).abs() < f64::EPSILON);
    assert!(repo.reserve_budget(today, 0.9, &limits).await.unwrap());
}
