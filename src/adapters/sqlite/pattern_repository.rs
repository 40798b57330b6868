//! SQLite implementation of the PatternRepository.
//!
//! Counter updates are single-statement atomic increments; the upsert is an
//! `ON CONFLICT` insert so concurrent attempts never duplicate a
//! fingerprint. Embeddings are stored as little-endian f32 BLOBs.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::{
    ActionType, CausalityEdge, FixAction, Pattern, SafetyCategory,
};
use crate::domain::ports::PatternRepository;

use super::parse_datetime;

#[derive(Clone)]
pub struct SqlitePatternRepository {
    pool: SqlitePool,
}

impl SqlitePatternRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_pattern(row: &sqlx::sqlite::SqliteRow) -> HealResult<Pattern> {
        let action_type = ActionType::from_str(&row.get::<String, _>("action_type"))
            .ok_or_else(|| HealError::Serialization("unknown action_type".to_string()))?;
        let safety = SafetyCategory::from_str(&row.get::<String, _>("safety"))
            .ok_or_else(|| HealError::Serialization("unknown safety category".to_string()))?;
        let target_files: Vec<String> =
            serde_json::from_str(&row.get::<String, _>("target_files"))?;

        Ok(Pattern {
            fingerprint: row.get("fingerprint"),
            embedding: row
                .get::<Option<Vec<u8>>, _>("embedding")
                .as_deref()
                .map(decode_embedding)
                .transpose()?,
            fix: FixAction {
                action_type,
                payload: row.get("payload"),
                target_files,
            },
            safety,
            occurrence_count: row.get::<i64, _>("occurrence_count") as u32,
            success_count: row.get::<i64, _>("success_count") as u32,
            failure_count: row.get::<i64, _>("failure_count") as u32,
            consecutive_failures: row.get::<i64, _>("consecutive_failures") as u32,
            quarantined: row.get::<i64, _>("quarantined") != 0,
            quarantine_reason: row.get("quarantine_reason"),
            created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
            last_seen_at: parse_datetime(&row.get::<String, _>("last_seen_at"))?,
        })
    }

    async fn fetch_all(&self, query: &str, limit: Option<i64>) -> HealResult<Vec<Pattern>> {
        let mut q = sqlx::query(query);
        if let Some(limit) = limit {
            q = q.bind(limit);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_pattern).collect()
    }
}

#[async_trait]
impl PatternRepository for SqlitePatternRepository {
    async fn upsert(&self, pattern: &Pattern) -> HealResult<()> {
        sqlx::query(
            r"INSERT INTO patterns (fingerprint, embedding, action_type, payload, target_files,
               safety, occurrence_count, success_count, failure_count, consecutive_failures,
               quarantined, quarantine_reason, created_at, last_seen_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(fingerprint) DO UPDATE SET
                   occurrence_count = patterns.occurrence_count + 1,
                   last_seen_at = excluded.last_seen_at",
        )
        .bind(&pattern.fingerprint)
        .bind(pattern.embedding.as_deref().map(encode_embedding))
        .bind(pattern.fix.action_type.as_str())
        .bind(&pattern.fix.payload)
        .bind(serde_json::to_string(&pattern.fix.target_files)?)
        .bind(pattern.safety.as_str())
        .bind(i64::from(pattern.occurrence_count))
        .bind(i64::from(pattern.success_count))
        .bind(i64::from(pattern.failure_count))
        .bind(i64::from(pattern.consecutive_failures))
        .bind(i64::from(pattern.quarantined))
        .bind(&pattern.quarantine_reason)
        .bind(pattern.created_at.to_rfc3339())
        .bind(pattern.last_seen_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, fingerprint: &str) -> HealResult<Option<Pattern>> {
        let row = sqlx::query("SELECT * FROM patterns WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_pattern).transpose()
    }

    async fn record_occurrence(&self, fingerprint: &str) -> HealResult<()> {
        let result = sqlx::query(
            "UPDATE patterns SET occurrence_count = occurrence_count + 1, last_seen_at = ?
             WHERE fingerprint = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HealError::PatternNotFound(fingerprint.to_string()));
        }
        Ok(())
    }

    async fn record_success(&self, fingerprint: &str) -> HealResult<()> {
        let result = sqlx::query(
            "UPDATE patterns SET success_count = success_count + 1,
                 consecutive_failures = 0, last_seen_at = ?
             WHERE fingerprint = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HealError::PatternNotFound(fingerprint.to_string()));
        }
        Ok(())
    }

    async fn record_failure(&self, fingerprint: &str, quarantine_after: u32) -> HealResult<()> {
        let result = sqlx::query(
            "UPDATE patterns SET
                 failure_count = failure_count + 1,
                 consecutive_failures = consecutive_failures + 1,
                 quarantine_reason = CASE
                     WHEN consecutive_failures + 1 >= ?1 AND quarantined = 0
                     THEN 'auto-quarantined after repeated failures'
                     ELSE quarantine_reason END,
                 quarantined = CASE
                     WHEN consecutive_failures + 1 >= ?1 THEN 1
                     ELSE quarantined END,
                 last_seen_at = ?2
             WHERE fingerprint = ?3",
        )
        .bind(i64::from(quarantine_after))
        .bind(Utc::now().to_rfc3339())
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HealError::PatternNotFound(fingerprint.to_string()));
        }
        Ok(())
    }

    async fn set_quarantined(
        &self,
        fingerprint: &str,
        quarantined: bool,
        reason: Option<String>,
    ) -> HealResult<()> {
        let result = sqlx::query(
            "UPDATE patterns SET quarantined = ?, quarantine_reason = ?,
                 consecutive_failures = CASE WHEN ? = 0 THEN 0 ELSE consecutive_failures END
             WHERE fingerprint = ?",
        )
        .bind(i64::from(quarantined))
        .bind(&reason)
        .bind(i64::from(quarantined))
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HealError::PatternNotFound(fingerprint.to_string()));
        }
        Ok(())
    }

    async fn top_frequent(&self, limit: usize) -> HealResult<Vec<Pattern>> {
        self.fetch_all(
            "SELECT * FROM patterns WHERE quarantined = 0
             ORDER BY occurrence_count DESC LIMIT ?",
            Some(limit as i64),
        )
        .await
    }

    async fn with_embeddings(&self) -> HealResult<Vec<Pattern>> {
        self.fetch_all(
            "SELECT * FROM patterns WHERE quarantined = 0 AND embedding IS NOT NULL",
            None,
        )
        .await
    }

    async fn list_all(&self) -> HealResult<Vec<Pattern>> {
        self.fetch_all("SELECT * FROM patterns ORDER BY occurrence_count DESC", None)
            .await
    }

    async fn count(&self) -> HealResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patterns")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn add_causality_edge(&self, edge: &CausalityEdge) -> HealResult<()> {
        sqlx::query(
            r"INSERT INTO causality_edges (cause_fingerprint, effect_fingerprint, observed_at, depth)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(cause_fingerprint, effect_fingerprint) DO UPDATE SET
                   observed_at = excluded.observed_at",
        )
        .bind(&edge.cause_fingerprint)
        .bind(&edge.effect_fingerprint)
        .bind(edge.observed_at.to_rfc3339())
        .bind(i64::from(edge.depth))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn edges_from(&self, cause_fingerprint: &str) -> HealResult<Vec<CausalityEdge>> {
        let rows = sqlx::query(
            "SELECT * FROM causality_edges WHERE cause_fingerprint = ? ORDER BY observed_at DESC",
        )
        .bind(cause_fingerprint)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CausalityEdge {
                    cause_fingerprint: row.get("cause_fingerprint"),
                    effect_fingerprint: row.get("effect_fingerprint"),
                    observed_at: parse_datetime(&row.get::<String, _>("observed_at"))?,
                    depth: row.get::<i64, _>("depth") as u32,
                })
            })
            .collect()
    }
}

/// Embedding vectors are stored as little-endian f32 bytes.
fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> HealResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(HealError::Serialization(
            "embedding blob length is not a multiple of 4".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
