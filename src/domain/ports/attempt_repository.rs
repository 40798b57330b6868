//! Append-only audit log for fix attempts.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::HealResult;
use crate::domain::models::FixAttempt;

/// Outcome counts grouped by kind, for status reporting.
#[derive(Debug, Clone)]
pub struct OutcomeCount {
    pub outcome: String,
    pub count: i64,
}

/// Append-only persistence for fix attempt audit records.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append a finalized attempt. Records are never updated or deleted.
    async fn append(&self, attempt: &FixAttempt) -> HealResult<()>;

    async fn get(&self, id: Uuid) -> HealResult<Option<FixAttempt>>;

    /// Most recent attempts, newest first.
    async fn recent(&self, limit: usize) -> HealResult<Vec<FixAttempt>>;

    /// Attempts for one error fingerprint, newest first.
    async fn by_fingerprint(&self, fingerprint: &str) -> HealResult<Vec<FixAttempt>>;

    /// Today's outcome counts grouped by kind.
    async fn outcome_counts_today(&self) -> HealResult<Vec<OutcomeCount>>;
}
