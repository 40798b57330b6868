//! Local git adapter.
//!
//! Applies fixes to the working tree with `git apply`, stages them for
//! review, and may fast-path merge SAFE fixes by committing directly.
//! Rollback restores the pre-apply state with `git checkout` / `git clean`
//! against the recorded dirty paths.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::errors::{HealError, HealResult};
use crate::domain::ports::{CommandOutput, VcsProvider};

#[derive(Debug)]
pub struct LocalGitVcs {
    project_root: PathBuf,
}

impl LocalGitVcs {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> HealResult<CommandOutput> {
        debug!(?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HealError::Apply(format!("failed to run git {args:?}: {e}")))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn git_ok(&self, args: &[&str]) -> HealResult<()> {
        let output = self.git(args).await?;
        if !output.success() {
            return Err(HealError::Apply(format!(
                "git {args:?} exited {}: {}",
                output.exit_code, output.stderr
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VcsProvider for LocalGitVcs {
    fn name(&self) -> &'static str {
        "local-git"
    }

    fn supports_direct_merge(&self) -> bool {
        true
    }

    async fn apply_diff(&self, diff: &str) -> HealResult<()> {
        let mut child = Command::new("git")
            .args(["apply", "--whitespace=nowarn", "-"])
            .current_dir(&self.project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HealError::Apply(format!("failed to spawn git apply: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(diff.as_bytes())
                .await
                .map_err(|e| HealError::Apply(format!("failed to pipe diff: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HealError::Apply(format!("git apply failed: {e}")))?;
        if !output.status.success() {
            return Err(HealError::Apply(format!(
                "git apply rejected the diff: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn run_command(&self, command: &str) -> HealResult<CommandOutput> {
        let output = Command::new("sh")
            .args(["-c", command])
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HealError::Apply(format!("failed to run command: {e}")))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> HealResult<()> {
        let full = self.project_root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HealError::Apply(format!("failed to create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| HealError::Apply(format!("failed to write {}: {e}", full.display())))
    }

    /// Local trees have no forge; a "pull request" is a staged branch the
    /// operator reviews. The fix is committed to a healing branch and the
    /// branch name is returned as the reference.
    async fn open_pull_request(&self, title: &str, body: &str) -> HealResult<String> {
        let branch = format!("mender/fix-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
        self.git_ok(&["checkout", "-b", &branch]).await?;
        self.git_ok(&["add", "-A"]).await?;
        let message = format!("{title}\n\n{body}");
        self.git_ok(&["commit", "-m", &message]).await?;
        self.git_ok(&["checkout", "-"]).await?;
        info!(branch = %branch, "fix staged on review branch");
        Ok(branch)
    }

    async fn merge(&self, message: &str) -> HealResult<()> {
        self.git_ok(&["add", "-A"]).await?;
        self.git_ok(&["commit", "-m", message]).await?;
        info!("fix committed directly");
        Ok(())
    }

    async fn revert(&self) -> HealResult<()> {
        self.git_ok(&["checkout", "--", "."]).await?;
        self.git_ok(&["clean", "-fd"]).await?;
        info!("working tree restored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo() -> (tempfile::TempDir, LocalGitVcs) {
        let dir = tempfile::tempdir().unwrap();
        let vcs = LocalGitVcs::new(dir.path());
        vcs.run_command("git init -q && git config user.email t@t && git config user.name t")
            .await
            .unwrap();
        std::fs::write(dir.path().join("app.txt"), "hello\n").unwrap();
        vcs.run_command("git add -A && git commit -qm init").await.unwrap();
        (dir, vcs)
    }

    #[tokio::test]
    async fn run_command_captures_exit_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = LocalGitVcs::new(dir.path());
        let out = vcs.run_command("echo hi && exit 3").await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn write_file_then_revert_restores_the_tree() {
        let (dir, vcs) = init_repo().await;
        vcs.write_file("app.txt", "patched\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("app.txt")).unwrap(), "patched\n");

        vcs.revert().await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("app.txt")).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn merge_commits_the_staged_fix() {
        let (_dir, vcs) = init_repo().await;
        vcs.write_file("app.txt", "fixed\n").await.unwrap();
        vcs.merge("fix: app output").await.unwrap();

        let log = vcs.run_command("git log --oneline").await.unwrap();
        assert!(log.stdout.contains("fix: app output"));
        let status = vcs.run_command("git status --porcelain").await.unwrap();
        assert!(status.stdout.trim().is_empty());
    }

    #[tokio::test]
    async fn open_pull_request_stages_a_review_branch() {
        let (_dir, vcs) = init_repo().await;
        vcs.write_file("app.txt", "fixed\n").await.unwrap();
        let branch = vcs.open_pull_request("fix app", "details").await.unwrap();
        assert!(branch.starts_with("mender/fix-"));

        let branches = vcs.run_command("git branch --list 'mender/*'").await.unwrap();
        assert!(branches.stdout.contains(&branch));
    }
}
