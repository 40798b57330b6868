//! Hosted forge adapter.
//!
//! Applies fixes to the CI checkout the same way the local adapter does,
//! but never merges: every applied fix is pushed to a branch and submitted
//! as a pull request through the forge API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::RemoteConfig;
use crate::domain::ports::{CommandOutput, VcsProvider};

use super::local_git::LocalGitVcs;

#[derive(Debug)]
pub struct RemoteApiVcs {
    /// Tree operations run against the CI checkout.
    tree: LocalGitVcs,
    config: RemoteConfig,
    client: reqwest::Client,
    token: String,
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Deserialize)]
struct PullRequestResponse {
    html_url: String,
}

impl RemoteApiVcs {
    /// Fails only on misconfiguration (missing token or repository slug).
    pub fn new(
        project_root: impl Into<std::path::PathBuf>,
        config: RemoteConfig,
        token: Option<String>,
    ) -> HealResult<Self> {
        let token = token
            .or_else(|| std::env::var("MENDER_FORGE_TOKEN").ok())
            .ok_or_else(|| {
                HealError::Configuration(
                    "forge token not set. Set MENDER_FORGE_TOKEN or configure a token.".to_string(),
                )
            })?;
        if config.repository.is_empty() {
            return Err(HealError::Configuration(
                "remote.repository must be an owner/repo slug in hosted environments".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("mender")
            .build()
            .map_err(|e| HealError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            tree: LocalGitVcs::new(project_root),
            config,
            client,
            token,
        })
    }
}

#[async_trait]
impl VcsProvider for RemoteApiVcs {
    fn name(&self) -> &'static str {
        "remote-api"
    }

    fn supports_direct_merge(&self) -> bool {
        false
    }

    async fn apply_diff(&self, diff: &str) -> HealResult<()> {
        self.tree.apply_diff(diff).await
    }

    async fn run_command(&self, command: &str) -> HealResult<CommandOutput> {
        self.tree.run_command(command).await
    }

    async fn write_file(&self, path: &str, content: &str) -> HealResult<()> {
        self.tree.write_file(path, content).await
    }

    async fn open_pull_request(&self, title: &str, body: &str) -> HealResult<String> {
        // Stage the fix on a branch and push it before calling the API.
        let branch = self.tree.open_pull_request(title, body).await?;
        let push = self
            .tree
            .run_command(&format!("git push -u origin {branch}"))
            .await?;
        if !push.success() {
            return Err(HealError::provider(
                "forge",
                format!("failed to push {branch}: {}", push.stderr),
            ));
        }

        let url = format!(
            "{}/repos/{}/pulls",
            self.config.base_url, self.config.repository
        );
        let request = CreatePullRequest {
            title,
            body,
            head: &branch,
            base: &self.config.default_branch,
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| HealError::provider("forge", format!("pull request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(HealError::provider(
                "forge",
                format!("API returned {status}: {text}"),
            ));
        }

        let pr: PullRequestResponse = response
            .json()
            .await
            .map_err(|e| HealError::provider("forge", format!("malformed response: {e}")))?;
        info!(url = %pr.html_url, "pull request opened");
        Ok(pr.html_url)
    }

    /// Hosted environments never merge directly, irrespective of safety tier.
    async fn merge(&self, _message: &str) -> HealResult<()> {
        Err(HealError::PermissionDenied(
            "direct merge is not available in hosted environments".to_string(),
        ))
    }

    async fn revert(&self) -> HealResult<()> {
        self.tree.revert().await
    }
}
