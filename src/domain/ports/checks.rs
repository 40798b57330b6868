//! Verification check runner port.

use async_trait::async_trait;

use crate::domain::errors::HealResult;
use crate::domain::models::CheckConfig;

/// Result of one build/lint/test check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    /// Combined stdout/stderr, truncated by the runner.
    pub output: String,
}

/// Runs named verification checks as subprocesses.
#[async_trait]
pub trait CheckRunner: Send + Sync {
    /// Run a check. `targets` expands the `{targets}` placeholder in the
    /// check command for narrowed (affected-tests-only) verification; pass
    /// an empty slice for a full run.
    async fn run(&self, check: &CheckConfig, targets: &[String]) -> HealResult<CheckOutcome>;
}
