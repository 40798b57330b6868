//! SQLite implementation of the shared-state repository.
//!
//! Breaker writes are compare-and-set on the version column; budget
//! reservations are single-statement check-and-increments. Two concurrent
//! fix attempts can never both claim the last budget slot or both win a
//! breaker transition.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::errors::HealResult;
use crate::domain::models::{
    BreakerStatus, Budget, BudgetConfig, CircuitBreakerState,
};
use crate::domain::ports::StateRepository;

use super::parse_datetime;

#[derive(Clone)]
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn ensure_budget_row(&self, date: NaiveDate) -> HealResult<()> {
        sqlx::query("INSERT OR IGNORE INTO budgets (date) VALUES (?)")
            .bind(date.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StateRepository for SqliteStateRepository {
    async fn load_breaker(&self, project_id: &str) -> HealResult<CircuitBreakerState> {
        sqlx::query("INSERT OR IGNORE INTO breaker_states (project_id) VALUES (?)")
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT * FROM breaker_states WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;

        let status = BreakerStatus::from_str(&row.get::<String, _>("status"))
            .unwrap_or(BreakerStatus::Closed);
        let reverts: Vec<String> = serde_json::from_str(&row.get::<String, _>("recent_reverts"))?;
        let recent_reverts: Vec<DateTime<Utc>> = reverts
            .iter()
            .map(|s| parse_datetime(s))
            .collect::<HealResult<_>>()?;

        Ok(CircuitBreakerState {
            project_id: project_id.to_string(),
            status,
            recent_reverts,
            opened_at: row
                .get::<Option<String>, _>("opened_at")
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            probe_in_flight: row.get::<i64, _>("probe_in_flight") != 0,
            version: row.get("version"),
        })
    }

    async fn store_breaker(&self, state: &CircuitBreakerState) -> HealResult<bool> {
        let reverts: Vec<String> = state.recent_reverts.iter().map(|t| t.to_rfc3339()).collect();
        let result = sqlx::query(
            "UPDATE breaker_states SET status = ?, recent_reverts = ?, opened_at = ?,
                 probe_in_flight = ?, version = version + 1
             WHERE project_id = ? AND version = ?",
        )
        .bind(state.status.as_str())
        .bind(serde_json::to_string(&reverts)?)
        .bind(state.opened_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(state.probe_in_flight))
        .bind(&state.project_id)
        .bind(state.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn reserve_budget(
        &self,
        date: NaiveDate,
        estimate_usd: f64,
        limits: &BudgetConfig,
    ) -> HealResult<bool> {
        self.ensure_budget_row(date).await?;
        let result = sqlx::query(
            "UPDATE budgets SET spent_usd = spent_usd + ?1, validations_today = validations_today + 1
             WHERE date = ?2
               AND spent_usd + ?1 <= ?3
               AND validations_today + 1 <= ?4",
        )
        .bind(estimate_usd)
        .bind(date.to_string())
        .bind(limits.daily_limit_usd)
        .bind(i64::from(limits.max_validations_per_day))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit_spend(&self, date: NaiveDate, delta_usd: f64) -> HealResult<()> {
        self.ensure_budget_row(date).await?;
        sqlx::query("UPDATE budgets SET spent_usd = MAX(0, spent_usd + ?) WHERE date = ?")
            .bind(delta_usd)
            .bind(date.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_budget(&self, date: NaiveDate, limits: &BudgetConfig) -> HealResult<Budget> {
        let row = sqlx::query("SELECT * FROM budgets WHERE date = ?")
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let (spent_usd, validations_today) = row
            .map(|r| {
                (
                    r.get::<f64, _>("spent_usd"),
                    r.get::<i64, _>("validations_today") as u32,
                )
            })
            .unwrap_or((0.0, 0));

        Ok(Budget {
            date,
            spent_usd,
            limit_usd: limits.daily_limit_usd,
            validations_today,
            max_validations_per_day: limits.max_validations_per_day,
        })
    }
}
