//! Three-tier pattern lookup: exact fingerprint, semantic similarity, and
//! causality-graph context.
//!
//! Tiers compose first-match-wins as an explicit ordered fallthrough:
//! Tier 1 (cache → store), then Tier 2 (only on a Tier-1 miss, only with an
//! embedding provider configured). Tier 3 runs independently and is always
//! attached as investigative context, never auto-applied by itself.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::adapters::cache::PatternCache;
use crate::domain::errors::HealResult;
use crate::domain::models::{
    CausalityEdge, EmbeddingConfig, ErrorEvent, LookupConfig, LookupResult, MatchTier, Pattern,
    PatternMatch,
};
use crate::domain::ports::{EmbeddingProvider, PatternRepository};

pub struct PatternStore {
    repo: Arc<dyn PatternRepository>,
    cache: PatternCache,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    lookup_config: LookupConfig,
    similarity_threshold: f32,
}

impl PatternStore {
    pub fn new(
        repo: Arc<dyn PatternRepository>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        lookup_config: LookupConfig,
        embedding_config: &EmbeddingConfig,
    ) -> Self {
        let cache = PatternCache::new(Duration::from_secs(lookup_config.cache_ttl_secs));
        Self {
            repo,
            cache,
            embedder,
            lookup_config,
            similarity_threshold: embedding_config.similarity_threshold,
        }
    }

    /// Load the top-N frequent patterns into the cache. Called at startup.
    pub async fn warm_cache(&self) -> HealResult<usize> {
        let frequent = self
            .repo
            .top_frequent(self.lookup_config.cache_warm_count)
            .await?;
        let count = frequent.len();
        for pattern in frequent {
            self.cache.put(pattern).await;
        }
        debug!(count, "pattern cache warmed");
        Ok(count)
    }

    /// Three-tier lookup. Matches are the first non-empty of Tier 1 and
    /// Tier 2; Tier-3 causal context is always attached.
    pub async fn lookup(&self, event: &ErrorEvent) -> HealResult<LookupResult> {
        let mut matches = match self.exact_tier(event).await? {
            Some(hit) => vec![hit],
            None => self.semantic_tier(event).await,
        };
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let causal_context = self.causal_tier(&event.fingerprint).await?;
        Ok(LookupResult {
            matches,
            causal_context,
        })
    }

    /// Tier 1: TTL cache, then the persistent store (write-through on hit).
    /// Quarantined patterns count as a miss.
    async fn exact_tier(&self, event: &ErrorEvent) -> HealResult<Option<PatternMatch>> {
        if let Some(cached) = self.cache.get(&event.fingerprint).await {
            if !cached.quarantined {
                return Ok(Some(PatternMatch {
                    pattern: (*cached).clone(),
                    tier: MatchTier::Exact,
                    similarity: 1.0,
                }));
            }
            return Ok(None);
        }

        let Some(stored) = self.repo.get(&event.fingerprint).await? else {
            return Ok(None);
        };
        if stored.quarantined {
            return Ok(None);
        }
        self.cache.put(stored.clone()).await;
        Ok(Some(PatternMatch {
            pattern: stored,
            tier: MatchTier::Exact,
            similarity: 1.0,
        }))
    }

    /// Tier 2: embed the error text and rank stored embeddings by cosine
    /// similarity. Empty (not fatal) when no provider is configured or the
    /// provider fails.
    async fn semantic_tier(&self, event: &ErrorEvent) -> Vec<PatternMatch> {
        let Some(embedder) = &self.embedder else {
            return Vec::new();
        };

        let query = match embedder.embed(&event.embedding_text()).await {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "embedding provider failed, skipping semantic tier");
                return Vec::new();
            }
        };

        let candidates = match self.repo.with_embeddings().await {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "embedding scan failed, skipping semantic tier");
                return Vec::new();
            }
        };

        let mut matches: Vec<PatternMatch> = candidates
            .into_iter()
            .filter_map(|pattern| {
                let embedding = pattern.embedding.as_deref()?;
                let similarity = cosine_similarity(&query, embedding);
                (similarity >= self.similarity_threshold).then(|| PatternMatch {
                    pattern,
                    tier: MatchTier::Semantic,
                    similarity,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches
    }

    /// Tier 3: bounded-depth breadth-first traversal of the causality graph
    /// starting at the fingerprint.
    async fn causal_tier(&self, fingerprint: &str) -> HealResult<Vec<CausalityEdge>> {
        let mut context = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        visited.insert(fingerprint.to_string());
        frontier.push_back((fingerprint.to_string(), 0));

        while let Some((node, depth)) = frontier.pop_front() {
            if depth >= self.lookup_config.causality_depth {
                continue;
            }
            for edge in self.repo.edges_from(&node).await? {
                if visited.insert(edge.effect_fingerprint.clone()) {
                    frontier.push_back((edge.effect_fingerprint.clone(), depth + 1));
                }
                context.push(edge);
            }
        }
        Ok(context)
    }

    /// Increment occurrence once a lookup leads to a recorded fix attempt.
    pub async fn record_occurrence(&self, fingerprint: &str) -> HealResult<()> {
        self.repo.record_occurrence(fingerprint).await?;
        self.cache.invalidate(fingerprint).await;
        Ok(())
    }

    pub async fn record_success(&self, fingerprint: &str) -> HealResult<()> {
        self.repo.record_success(fingerprint).await?;
        self.cache.invalidate(fingerprint).await;
        Ok(())
    }

    pub async fn record_failure(&self, fingerprint: &str, quarantine_after: u32) -> HealResult<()> {
        self.repo.record_failure(fingerprint, quarantine_after).await?;
        self.cache.invalidate(fingerprint).await;
        Ok(())
    }

    pub async fn quarantine(&self, fingerprint: &str, reason: impl Into<String>) -> HealResult<()> {
        self.repo
            .set_quarantined(fingerprint, true, Some(reason.into()))
            .await?;
        self.cache.invalidate(fingerprint).await;
        Ok(())
    }

    pub async fn unquarantine(&self, fingerprint: &str) -> HealResult<()> {
        self.repo.set_quarantined(fingerprint, false, None).await?;
        self.cache.invalidate(fingerprint).await;
        Ok(())
    }

    /// Bulk-load curated patterns (the precedent rule's "explicit seed").
    pub async fn seed(&self, patterns: &[Pattern]) -> HealResult<usize> {
        for pattern in patterns {
            self.repo.upsert(pattern).await?;
        }
        Ok(patterns.len())
    }

    pub async fn add_causality_edge(&self, edge: &CausalityEdge) -> HealResult<()> {
        self.repo.add_causality_edge(edge).await
    }

    pub async fn get(&self, fingerprint: &str) -> HealResult<Option<Pattern>> {
        self.repo.get(fingerprint).await
    }

    pub async fn upsert(&self, pattern: &Pattern) -> HealResult<()> {
        self.repo.upsert(pattern).await?;
        self.cache.invalidate(&pattern.fingerprint).await;
        Ok(())
    }

    /// Replay one historical event through the lookup/record path (the
    /// backfill operation). Returns whether a pattern matched.
    pub async fn replay_event(&self, event: &ErrorEvent) -> HealResult<bool> {
        let lookup = self.lookup(event).await?;
        if let Some(matched) = lookup.best() {
            self.record_occurrence(&matched.pattern.fingerprint).await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn export(&self) -> HealResult<Vec<Pattern>> {
        self.repo.list_all().await
    }

    pub async fn count(&self) -> HealResult<i64> {
        self.repo.count().await
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched or degenerate
/// inputs so bad embeddings rank last instead of erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.25, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn degenerate_inputs_rank_last() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
