//! Domain errors for the mender remediation engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while matching, validating, or
/// applying a candidate fix.
#[derive(Debug, Error)]
pub enum HealError {
    /// Missing credentials or a misconfigured budget. Fatal at startup only.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network, timeout, or quota failure on an external provider call.
    /// Degrades gracefully: Tier-2 lookup is skipped, judge calls become
    /// ERROR votes. Never crashes the pipeline.
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// A build/lint/test check failed. Nothing was applied, so no rollback.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Applying the fix or the post-apply verification failed. Triggers rollback.
    #[error("Apply failed: {0}")]
    Apply(String),

    #[error("Daily budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Safety violation: {0}")]
    SafetyViolation(String),

    #[error("Circuit breaker is open: {0}")]
    CircuitOpen(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Fix attempt not found: {0}")]
    AttemptNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type HealResult<T> = Result<T, HealError>;

impl HealError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Transient failures that should degrade rather than abort the pipeline.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

impl From<sqlx::Error> for HealError {
    fn from(err: sqlx::Error) -> Self {
        HealError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for HealError {
    fn from(err: serde_json::Error) -> Self {
        HealError::Serialization(err.to_string())
    }
}
