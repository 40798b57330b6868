//! Version-control / pull-request provider port.
//!
//! A capability interface with two concrete variants selected at
//! construction: a local adapter that can fast-path merge SAFE fixes, and a
//! hosted adapter that always opens pull requests.

use async_trait::async_trait;

use crate::domain::errors::HealResult;

/// Captured output of a command run through the provider.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait VcsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this provider may merge directly (local only).
    fn supports_direct_merge(&self) -> bool;

    /// Apply a unified diff to the working tree.
    async fn apply_diff(&self, diff: &str) -> HealResult<()>;

    /// Run a shell command in the project root.
    async fn run_command(&self, command: &str) -> HealResult<CommandOutput>;

    /// Replace a file's contents (file-edit fixes).
    async fn write_file(&self, path: &str, content: &str) -> HealResult<()>;

    /// Open a pull request for the staged fix; returns its URL.
    async fn open_pull_request(&self, title: &str, body: &str) -> HealResult<String>;

    /// Commit and merge the staged fix directly.
    async fn merge(&self, message: &str) -> HealResult<()>;

    /// Revert the staged fix, restoring the pre-apply state.
    async fn revert(&self) -> HealResult<()>;
}
