//! Embedding provider port for Tier-2 semantic lookup.

use async_trait::async_trait;

use crate::domain::errors::HealResult;

/// Converts error text into a dense vector for similarity search.
///
/// Providers are optional: Tier-2 lookup degrades to empty when none is
/// configured or a call fails.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn name(&self) -> &'static str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> HealResult<Vec<f32>>;
}
