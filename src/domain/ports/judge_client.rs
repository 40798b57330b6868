//! Judge model completion port.

use async_trait::async_trait;

use crate::domain::errors::HealResult;

/// A provider capable of completing prompts for any of the configured judge
/// models. Implementations handle retry, rate limiting, and auth; a failure
/// surfaces as a transient provider error which the judge service turns
/// into an ERROR vote.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Complete `prompt` with the named model and return the raw text.
    async fn complete(&self, model: &str, prompt: &str) -> HealResult<String>;
}
