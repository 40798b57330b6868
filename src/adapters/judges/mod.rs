//! Judge client adapters.

pub mod anthropic;
pub mod mock;
pub mod rate_limiter;
pub mod retry;

pub use anthropic::{AnthropicJudgeClient, AnthropicJudgeConfig};
pub use mock::ScriptedJudgeClient;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
