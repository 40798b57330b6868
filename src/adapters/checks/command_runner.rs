//! Subprocess-backed verification check runner.
//!
//! Each check is a shell command from config. The `{targets}` placeholder
//! narrows a check to affected files for post-apply verification. Output is
//! truncated so a noisy build log cannot blow up the audit record.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::CheckConfig;
use crate::domain::ports::{CheckOutcome, CheckRunner};

const MAX_OUTPUT_BYTES: usize = 16 * 1024;

pub struct CommandCheckRunner {
    project_root: PathBuf,
}

impl CommandCheckRunner {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }
}

#[async_trait]
impl CheckRunner for CommandCheckRunner {
    async fn run(&self, check: &CheckConfig, targets: &[String]) -> HealResult<CheckOutcome> {
        let command = check.command.replace("{targets}", &targets.join(" "));
        debug!(check = %check.name, command = %command, "running verification check");

        let output = Command::new("sh")
            .args(["-c", &command])
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                HealError::Verification(format!("failed to run check '{}': {e}", check.name))
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if combined.len() > MAX_OUTPUT_BYTES {
            let mut cut = MAX_OUTPUT_BYTES;
            while !combined.is_char_boundary(cut) {
                cut -= 1;
            }
            combined.truncate(cut);
        }

        Ok(CheckOutcome {
            name: check.name.clone(),
            passed: output.status.success(),
            output: combined,
        })
    }
}
