//! TTL-bounded cache in front of Tier-1 pattern lookups.
//!
//! Read-mostly and write-through: hits from the persistent store are
//! written back, warming keeps the top-N frequent patterns resident, and
//! entries expire on TTL. The cache is never the source of truth; counter
//! mutations always go to the repository and invalidate here.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::domain::models::Pattern;

/// Maximum number of resident patterns.
const CACHE_MAX_CAPACITY: u64 = 1024;

#[derive(Clone)]
pub struct PatternCache {
    by_fingerprint: Cache<String, Arc<Pattern>>,
}

impl PatternCache {
    pub fn new(ttl: Duration) -> Self {
        let by_fingerprint = Cache::builder()
            .max_capacity(CACHE_MAX_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { by_fingerprint }
    }

    pub async fn get(&self, fingerprint: &str) -> Option<Arc<Pattern>> {
        self.by_fingerprint.get(fingerprint).await
    }

    /// Write-through insert after a store hit or warm load.
    pub async fn put(&self, pattern: Pattern) {
        self.by_fingerprint
            .insert(pattern.fingerprint.clone(), Arc::new(pattern))
            .await;
    }

    /// Drop one entry after a counter mutation or quarantine change.
    pub async fn invalidate(&self, fingerprint: &str) {
        self.by_fingerprint.invalidate(fingerprint).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FixAction, SafetyCategory};

    fn pattern(fp: &str) -> Pattern {
        Pattern::new(fp, FixAction::command("true", vec![]), SafetyCategory::Safe)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = PatternCache::new(Duration::from_secs(60));
        cache.put(pattern("fp1")).await;
        assert!(cache.get("fp1").await.is_some());
        assert!(cache.get("fp2").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_drops_the_entry() {
        let cache = PatternCache::new(Duration::from_secs(60));
        cache.put(pattern("fp1")).await;
        cache.invalidate("fp1").await;
        assert!(cache.get("fp1").await.is_none());
    }
}
