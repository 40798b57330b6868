//! SQLite implementation of the append-only fix attempt audit log.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::HealResult;
use crate::domain::models::FixAttempt;
use crate::domain::ports::{AttemptRepository, OutcomeCount};

#[derive(Clone)]
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_attempt(row: &sqlx::sqlite::SqliteRow) -> HealResult<FixAttempt> {
        Ok(serde_json::from_str(&row.get::<String, _>("record"))?)
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn append(&self, attempt: &FixAttempt) -> HealResult<()> {
        sqlx::query(
            r"INSERT INTO fix_attempts (id, fingerprint, safety, stage_reached, outcome_kind,
               cost_spent_usd, record, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(attempt.id.to_string())
        .bind(&attempt.event.fingerprint)
        .bind(attempt.safety.as_str())
        .bind(attempt.stage_reached.as_str())
        .bind(attempt.outcome.kind())
        .bind(attempt.cost_spent_usd)
        .bind(serde_json::to_string(attempt)?)
        .bind(attempt.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> HealResult<Option<FixAttempt>> {
        let row = sqlx::query("SELECT record FROM fix_attempts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_attempt).transpose()
    }

    async fn recent(&self, limit: usize) -> HealResult<Vec<FixAttempt>> {
        let rows = sqlx::query("SELECT record FROM fix_attempts ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_attempt).collect()
    }

    async fn by_fingerprint(&self, fingerprint: &str) -> HealResult<Vec<FixAttempt>> {
        let rows = sqlx::query(
            "SELECT record FROM fix_attempts WHERE fingerprint = ? ORDER BY created_at DESC",
        )
        .bind(fingerprint)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_attempt).collect()
    }

    async fn outcome_counts_today(&self) -> HealResult<Vec<OutcomeCount>> {
        let midnight = format!("{}T00:00:00+00:00", Utc::now().date_naive());
        let rows = sqlx::query(
            "SELECT outcome_kind, COUNT(*) AS n FROM fix_attempts
             WHERE created_at >= ? GROUP BY outcome_kind ORDER BY n DESC",
        )
        .bind(midnight)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| OutcomeCount {
                outcome: row.get("outcome_kind"),
                count: row.get("n"),
            })
            .collect())
    }
}
