//! Fix application: apply, re-verify narrowly, roll back on failure,
//! record outcomes, and merge or open a pull request.
//!
//! The adapter decides the final step: local trees may fast-path merge a
//! SAFE fix, hosted environments always open a pull request.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::{
    ActionType, AttemptOutcome, CausalityEdge, CheckConfig, FixAttempt, Pattern, RollbackInfo,
};
use crate::domain::ports::{CheckRunner, VcsProvider};
use crate::services::breaker::CircuitBreaker;
use crate::services::cascade::CascadeDetector;
use crate::services::lookup::PatternStore;

pub struct FixApplicator {
    vcs: Arc<dyn VcsProvider>,
    checks: Arc<dyn CheckRunner>,
    store: Arc<PatternStore>,
    cascade: Arc<CascadeDetector>,
    breaker: Arc<CircuitBreaker>,
    /// Narrowed check re-run against the affected files after apply.
    post_apply_check: Option<CheckConfig>,
    quarantine_after: u32,
}

impl FixApplicator {
    pub fn new(
        vcs: Arc<dyn VcsProvider>,
        checks: Arc<dyn CheckRunner>,
        store: Arc<PatternStore>,
        cascade: Arc<CascadeDetector>,
        breaker: Arc<CircuitBreaker>,
        post_apply_check: Option<CheckConfig>,
        quarantine_after: u32,
    ) -> Self {
        Self {
            vcs,
            checks,
            store,
            cascade,
            breaker,
            post_apply_check,
            quarantine_after,
        }
    }

    /// Apply an approved attempt. Refuses unapproved attempts with a
    /// permission error; every apply-time failure is handled internally
    /// (rollback + bookkeeping) and lands in the attempt's outcome.
    pub async fn apply(&self, attempt: &mut FixAttempt) -> HealResult<()> {
        if !attempt.approved {
            return Err(HealError::PermissionDenied(
                "fix attempt was not approved by the validation pipeline".to_string(),
            ));
        }

        if let Err(err) = self.apply_action(attempt).await {
            // Nothing may be partially applied; restore before recording.
            self.fail_and_rollback(attempt, format!("apply failed: {err}"))
                .await;
            return Ok(());
        }

        if let Some(reason) = self.post_apply_verification(attempt).await {
            self.fail_and_rollback(attempt, reason).await;
            return Ok(());
        }

        self.record_success(attempt).await;
        self.land(attempt).await;
        Ok(())
    }

    async fn apply_action(&self, attempt: &FixAttempt) -> HealResult<()> {
        match attempt.candidate.action_type {
            ActionType::Diff => self.vcs.apply_diff(&attempt.candidate.payload).await,
            ActionType::Command => {
                let output = self.vcs.run_command(&attempt.candidate.payload).await?;
                if !output.success() {
                    return Err(HealError::Apply(format!(
                        "fix command exited {}: {}",
                        output.exit_code, output.stderr
                    )));
                }
                Ok(())
            }
            ActionType::FileEdit => {
                let edit = attempt.candidate.as_file_edit().ok_or_else(|| {
                    HealError::Apply("malformed file_edit payload".to_string())
                })?;
                self.vcs.write_file(&edit.path, &edit.content).await
            }
        }
    }

    /// Narrowed re-verification: only the post-apply check, only the
    /// affected files. `None` means it passed (or none is configured).
    async fn post_apply_verification(&self, attempt: &FixAttempt) -> Option<String> {
        let check = self.post_apply_check.as_ref()?;
        match self
            .checks
            .run(check, &attempt.candidate.target_files)
            .await
        {
            Ok(outcome) if outcome.passed => None,
            Ok(outcome) => Some(format!(
                "post-apply {} failed: {}",
                outcome.name,
                outcome.output.lines().last().unwrap_or_default()
            )),
            Err(err) => Some(format!("post-apply check errored: {err}")),
        }
    }

    async fn fail_and_rollback(&self, attempt: &mut FixAttempt, reason: String) {
        warn!(fingerprint = %attempt.event.fingerprint, %reason, "rolling back applied fix");

        let reverted = match self.vcs.revert().await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "rollback itself failed; tree may need manual attention");
                false
            }
        };

        let now = Utc::now();
        for file in &attempt.candidate.target_files {
            self.cascade
                .record_fix(file, &attempt.event.fingerprint, now, true);
        }

        if let Some(fingerprint) = attempt.matched_fingerprint.clone() {
            if let Err(err) = self
                .store
                .record_failure(&fingerprint, self.quarantine_after)
                .await
            {
                warn!(error = %err, "failed to record pattern failure");
            }
        }

        let breaker_result = if attempt.is_probe {
            self.breaker.record_probe_result(false).await
        } else {
            self.breaker.record_revert().await
        };
        if let Err(err) = breaker_result {
            warn!(error = %err, "failed to update circuit breaker after rollback");
        }

        attempt.rollback = Some(RollbackInfo {
            reverted,
            detail: reason.clone(),
        });
        attempt.finalize(AttemptOutcome::RolledBack { reason });
    }

    async fn record_success(&self, attempt: &mut FixAttempt) {
        let now = Utc::now();
        for file in &attempt.candidate.target_files {
            self.cascade
                .record_fix(file, &attempt.event.fingerprint, now, false);
        }

        // Learn the association: ensure a pattern exists for this error,
        // then credit whichever pattern supplied the fix.
        let credited = attempt
            .matched_fingerprint
            .clone()
            .unwrap_or_else(|| attempt.event.fingerprint.clone());
        if let Ok(None) = self.store.get(&credited).await {
            let pattern = Pattern::new(
                credited.clone(),
                attempt.candidate.clone(),
                attempt.safety,
            );
            if let Err(err) = self.store.upsert(&pattern).await {
                warn!(error = %err, "failed to store new pattern");
            }
        }
        if let Err(err) = self.store.record_success(&credited).await {
            warn!(error = %err, "failed to record pattern success");
        }

        // A semantic match resolving this error is causal signal worth
        // keeping for Tier-3 context.
        if credited != attempt.event.fingerprint {
            let edge = CausalityEdge {
                cause_fingerprint: attempt.event.fingerprint.clone(),
                effect_fingerprint: credited,
                observed_at: now,
                depth: 1,
            };
            if let Err(err) = self.store.add_causality_edge(&edge).await {
                warn!(error = %err, "failed to record causality edge");
            }
        }

        if attempt.is_probe {
            if let Err(err) = self.breaker.record_probe_result(true).await {
                warn!(error = %err, "failed to close circuit breaker after probe success");
            }
        }
    }

    /// Merge directly (SAFE + local + unanimous) or open a pull request.
    async fn land(&self, attempt: &mut FixAttempt) {
        let title = format!(
            "fix: automated remediation for {}",
            attempt.event.error_type
        );

        if attempt.auto_apply_allowed && self.vcs.supports_direct_merge() {
            match self.vcs.merge(&title).await {
                Ok(()) => {
                    info!(fingerprint = %attempt.event.fingerprint, "fix auto-applied");
                    attempt.finalize(AttemptOutcome::AutoApplied);
                }
                Err(err) => {
                    self.fail_and_rollback(attempt, format!("merge failed: {err}"))
                        .await;
                }
            }
            return;
        }

        let body = build_pr_body(attempt);
        match self.vcs.open_pull_request(&title, &body).await {
            Ok(url) => {
                info!(fingerprint = %attempt.event.fingerprint, %url, "pull request opened for fix");
                attempt.finalize(AttemptOutcome::PullRequestOpened { url });
            }
            Err(err) => {
                self.fail_and_rollback(attempt, format!("pull request failed: {err}"))
                    .await;
            }
        }
    }
}

/// Re-apply a recorded attempt by id (the operator `apply` command).
/// `dry_run` returns the record untouched; `force` overrides a missing
/// approval - an explicit human decision, so it satisfies even the RISKY
/// gate. A fresh audit record is appended for the re-application.
pub async fn reapply_recorded(
    applicator: &FixApplicator,
    attempts: &dyn crate::domain::ports::AttemptRepository,
    id: uuid::Uuid,
    dry_run: bool,
    force: bool,
) -> HealResult<FixAttempt> {
    let recorded = attempts
        .get(id)
        .await?
        .ok_or(HealError::AttemptNotFound(id))?;

    if dry_run {
        return Ok(recorded);
    }

    let mut attempt = recorded;
    attempt.id = uuid::Uuid::new_v4();
    attempt.created_at = Utc::now();
    attempt.finished_at = None;
    attempt.outcome = AttemptOutcome::Pending;
    if force && !attempt.approved {
        attempt.approved = true;
        attempt.record_stage(
            crate::domain::models::PipelineStage::Apply,
            true,
            "operator forced approval via apply --force",
        );
    }

    applicator.apply(&mut attempt).await?;
    attempts.append(&attempt).await?;
    Ok(attempt)
}

/// Markdown body citing the originating error, the matched pattern, and the
/// judge reasoning, for later audit.
pub fn build_pr_body(attempt: &FixAttempt) -> String {
    let mut body = format!(
        "## Automated fix\n\n\
         **Error**: `{}` - {}\n\
         **Fingerprint**: `{}`\n\
         **Safety**: {}\n",
        attempt.event.error_type,
        attempt.event.message,
        attempt.event.fingerprint,
        attempt.safety.as_str(),
    );
    if let Some(matched) = &attempt.matched_fingerprint {
        body.push_str(&format!("**Matched pattern**: `{matched}`\n"));
    }

    if !attempt.votes.is_empty() {
        body.push_str("\n### Judge votes\n\n| Model | Vote | Reasoning |\n|---|---|---|\n");
        for vote in &attempt.votes {
            body.push_str(&format!(
                "| {} | {} | {} |\n",
                vote.model,
                vote.vote.as_str(),
                vote.reasoning.replace('\n', " "),
            ));
        }
    }

    body.push_str("\n### Pipeline\n\n");
    for report in &attempt.stage_reports {
        body.push_str(&format!(
            "- {}: {} - {}\n",
            report.stage.as_str(),
            if report.passed { "pass" } else { "fail" },
            report.reason,
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ErrorEvent, FixAction, JudgeVote, SafetyCategory, Vote};

    #[test]
    fn pr_body_cites_error_pattern_and_votes() {
        let event = ErrorEvent::new("py:ImportError", "No module named 'foo'", None, vec![], "p");
        let mut attempt = FixAttempt::new(
            event,
            FixAction::command("pip install foo", vec!["requirements.txt".into()]),
            SafetyCategory::Moderate,
        );
        attempt.matched_fingerprint = Some("abc123".to_string());
        attempt.votes.push(JudgeVote {
            model: "claude".to_string(),
            vote: Vote::Approve,
            reasoning: "known\nfix".to_string(),
            weight: 1.0,
            raw_text: String::new(),
        });

        let body = build_pr_body(&attempt);
        assert!(body.contains("py:ImportError"));
        assert!(body.contains("`abc123`"));
        assert!(body.contains("| claude | approve | known fix |"));
    }
}
