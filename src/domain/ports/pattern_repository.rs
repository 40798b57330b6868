//! Repository port for pattern persistence.

use async_trait::async_trait;

use crate::domain::errors::HealResult;
use crate::domain::models::{CausalityEdge, Pattern};

/// Persistence for stored patterns and the causality graph.
///
/// Mutations are atomic upserts / guarded updates against the backing
/// store; the in-process cache in front of this repository is never the
/// source of truth.
#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Insert a new pattern, or bump `occurrence_count` and `last_seen_at`
    /// if the fingerprint already exists.
    async fn upsert(&self, pattern: &Pattern) -> HealResult<()>;

    /// Fetch by fingerprint, quarantined or not.
    async fn get(&self, fingerprint: &str) -> HealResult<Option<Pattern>>;

    /// Atomically increment `occurrence_count`.
    async fn record_occurrence(&self, fingerprint: &str) -> HealResult<()>;

    /// Atomically increment `success_count` and clear the consecutive
    /// failure streak.
    async fn record_success(&self, fingerprint: &str) -> HealResult<()>;

    /// Atomically increment failure counters; quarantines the pattern once
    /// the consecutive-failure streak reaches `quarantine_after`.
    async fn record_failure(&self, fingerprint: &str, quarantine_after: u32) -> HealResult<()>;

    /// Quarantine or reinstate a pattern.
    async fn set_quarantined(
        &self,
        fingerprint: &str,
        quarantined: bool,
        reason: Option<String>,
    ) -> HealResult<()>;

    /// Most frequently occurring non-quarantined patterns, for cache warming.
    async fn top_frequent(&self, limit: usize) -> HealResult<Vec<Pattern>>;

    /// Non-quarantined patterns that carry an embedding, for Tier-2 ranking.
    async fn with_embeddings(&self) -> HealResult<Vec<Pattern>>;

    /// Every stored pattern, for export.
    async fn list_all(&self) -> HealResult<Vec<Pattern>>;

    async fn count(&self) -> HealResult<i64>;

    /// Record a causality edge (idempotent per cause/effect pair).
    async fn add_causality_edge(&self, edge: &CausalityEdge) -> HealResult<()>;

    /// Outgoing edges from a fingerprint, for Tier-3 traversal.
    async fn edges_from(&self, cause_fingerprint: &str) -> HealResult<Vec<CausalityEdge>>;
}
