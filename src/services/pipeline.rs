//! Staged validation pipeline: PRE_FLIGHT → VERIFICATION → APPROVAL.
//!
//! Stages are strictly sequential and each may short-circuit to a terminal
//! outcome. Within a stage, checks and judge calls fan out concurrently and
//! the stage waits for all of them under one shared timeout; a timeout
//! cancels the in-flight work and records the stage as failed, never as a
//! silent pass.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::domain::errors::HealResult;
use crate::domain::models::{
    ActionType, AttemptOutcome, Environment, ErrorEvent, FixAction, FixAttempt, PipelineConfig,
    PipelineStage, SafetyCategory,
};
use crate::domain::ports::CheckRunner;
use crate::services::breaker::{CircuitBreaker, FixAllowance};
use crate::services::cascade::CascadeDetector;
use crate::services::context::ContextRetriever;
use crate::services::cost::CostTracker;
use crate::services::judge::MultiModelJudge;
use crate::services::lookup::PatternStore;
use crate::services::safety::SafetyCategorizer;

/// Stage verdict: carry on, or stop with a terminal outcome.
enum StageVerdict {
    Continue,
    Stop(AttemptOutcome),
}

pub struct ValidationPipeline {
    breaker: Arc<CircuitBreaker>,
    cascade: Arc<CascadeDetector>,
    cost: Arc<CostTracker>,
    categorizer: SafetyCategorizer,
    store: Arc<PatternStore>,
    judge: Arc<MultiModelJudge>,
    context: Arc<ContextRetriever>,
    checks: Arc<dyn CheckRunner>,
    config: PipelineConfig,
    environment: Environment,
    kill_switch: bool,
}

#[allow(clippy::too_many_arguments)]
impl ValidationPipeline {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        cascade: Arc<CascadeDetector>,
        cost: Arc<CostTracker>,
        categorizer: SafetyCategorizer,
        store: Arc<PatternStore>,
        judge: Arc<MultiModelJudge>,
        context: Arc<ContextRetriever>,
        checks: Arc<dyn CheckRunner>,
        config: PipelineConfig,
        environment: Environment,
        kill_switch: bool,
    ) -> Self {
        Self {
            breaker,
            cascade,
            cost,
            categorizer,
            store,
            judge,
            context,
            checks,
            config,
            environment,
            kill_switch,
        }
    }

    /// Run a candidate through the staged pipeline. The returned attempt
    /// carries the stage reports, votes, cost, and (if it survived) the
    /// approval flags consumed by the applicator.
    pub async fn validate(
        &self,
        event: &ErrorEvent,
        candidate: FixAction,
        matched_fingerprint: Option<String>,
    ) -> HealResult<FixAttempt> {
        let diff = candidate_as_diff(&candidate);
        let safety = self.categorizer.categorize(&diff, &candidate.target_files);

        let mut attempt = FixAttempt::new(event.clone(), candidate, safety);
        attempt.matched_fingerprint = matched_fingerprint;

        let mut reserved_usd = 0.0;
        match self.pre_flight(&mut attempt, &mut reserved_usd).await? {
            StageVerdict::Stop(outcome) => {
                attempt.finalize(outcome);
                return Ok(attempt);
            }
            StageVerdict::Continue => {}
        }

        match self.verification(&mut attempt).await? {
            StageVerdict::Stop(outcome) => {
                self.settle_cost(&mut attempt, reserved_usd).await?;
                attempt.finalize(outcome);
                return Ok(attempt);
            }
            StageVerdict::Continue => {}
        }

        let verdict = self.approval(&mut attempt).await?;
        self.settle_cost(&mut attempt, reserved_usd).await?;
        if let StageVerdict::Stop(outcome) = verdict {
            attempt.finalize(outcome);
        }
        Ok(attempt)
    }

    /// Gate checks in order: breaker, kill switch, hard constraints,
    /// cascade, precedent, budget. First failure wins.
    async fn pre_flight(
        &self,
        attempt: &mut FixAttempt,
        reserved_usd: &mut f64,
    ) -> HealResult<StageVerdict> {
        let stage = PipelineStage::PreFlight;

        match self.breaker.should_allow_fix().await? {
            FixAllowance::Denied => {
                attempt.record_stage(stage, false, "circuit breaker is open");
                return Ok(StageVerdict::Stop(AttemptOutcome::Rejected {
                    reason: "circuit breaker is open: auto-healing disabled".to_string(),
                }));
            }
            FixAllowance::Probe => {
                attempt.is_probe = true;
                info!(fingerprint = %attempt.event.fingerprint, "attempt admitted as breaker probe");
            }
            FixAllowance::Allowed => {}
        }

        if self.kill_switch || std::env::var("MENDER_DISABLE").is_ok() {
            attempt.record_stage(stage, false, "kill switch engaged");
            return Ok(StageVerdict::Stop(AttemptOutcome::Rejected {
                reason: "kill switch engaged".to_string(),
            }));
        }

        let files = attempt.candidate.target_files.len();
        if files > self.config.max_files {
            let reason = format!("fix touches {files} files (limit {})", self.config.max_files);
            attempt.record_stage(stage, false, &reason);
            return Ok(StageVerdict::Stop(AttemptOutcome::Rejected { reason }));
        }
        let changed = changed_line_count(&candidate_as_diff(&attempt.candidate));
        if changed > self.config.max_changed_lines {
            let reason = format!(
                "fix changes {changed} lines (limit {})",
                self.config.max_changed_lines
            );
            attempt.record_stage(stage, false, &reason);
            return Ok(StageVerdict::Stop(AttemptOutcome::Rejected { reason }));
        }

        for file in touched_files(attempt) {
            if self.cascade.is_hot(&file) {
                let reason = format!("file {file} is hot: repeated modifications in the window");
                attempt.record_stage(stage, false, &reason);
                return Ok(StageVerdict::Stop(AttemptOutcome::Escalated { reason }));
            }
            if self.cascade.check_cascade(&file) {
                let reason =
                    format!("file {file} was fixed moments ago: possible healing cascade");
                attempt.record_stage(stage, false, &reason);
                return Ok(StageVerdict::Stop(AttemptOutcome::Escalated { reason }));
            }
        }

        if attempt.safety != SafetyCategory::Risky
            && attempt.matched_fingerprint.is_none()
            && self.store.get(&attempt.event.fingerprint).await?.is_none()
        {
            let reason = "no fix without precedent or explicit seed".to_string();
            attempt.record_stage(stage, false, &reason);
            return Ok(StageVerdict::Stop(AttemptOutcome::Rejected { reason }));
        }

        if !self.cost.can_validate(attempt.safety).await? {
            attempt.record_stage(stage, false, "daily budget or validation ceiling exhausted");
            return Ok(StageVerdict::Stop(AttemptOutcome::Rejected {
                reason: "daily budget or validation ceiling exhausted".to_string(),
            }));
        }
        *reserved_usd = self.cost.estimate_cost(attempt.safety);

        attempt.record_stage(stage, true, "preflight checks passed");
        Ok(StageVerdict::Continue)
    }

    /// Run every configured check concurrently under one shared timeout.
    /// All required checks must pass; a timeout fails the stage before any
    /// approval cost is spent.
    async fn verification(&self, attempt: &mut FixAttempt) -> HealResult<StageVerdict> {
        let stage = PipelineStage::Verification;
        let deadline = Duration::from_secs(self.config.verification_timeout_secs);

        let runs = self
            .config
            .checks
            .iter()
            .map(|check| self.checks.run(check, &[]));

        let outcomes = match timeout(deadline, join_all(runs)).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                let reason = format!(
                    "verification timed out after {}s",
                    self.config.verification_timeout_secs
                );
                warn!(fingerprint = %attempt.event.fingerprint, "{reason}");
                attempt.record_stage(stage, false, &reason);
                return Ok(StageVerdict::Stop(AttemptOutcome::Rejected { reason }));
            }
        };

        let mut failures = Vec::new();
        for (check, outcome) in self.config.checks.iter().zip(outcomes) {
            match outcome {
                Ok(result) if result.passed => {}
                Ok(result) if check.required => {
                    failures.push(format!("{} failed", result.name));
                }
                Ok(_) => {}
                Err(err) => failures.push(format!("{} errored: {err}", check.name)),
            }
        }

        if !failures.is_empty() {
            let reason = format!("verification failed: {}", failures.join(", "));
            attempt.record_stage(stage, false, &reason);
            return Ok(StageVerdict::Stop(AttemptOutcome::Rejected { reason }));
        }

        attempt.record_stage(stage, true, "all verification checks passed");
        Ok(StageVerdict::Continue)
    }

    /// Tiered judge consensus. RISKY always escalates to a human; for that
    /// tier the votes are advisory context only.
    async fn approval(&self, attempt: &mut FixAttempt) -> HealResult<StageVerdict> {
        let stage = PipelineStage::Approval;
        let deadline = Duration::from_secs(self.config.approval_timeout_secs);

        let context = self
            .context
            .retrieve(&attempt.event, &attempt.candidate)
            .await
            .render();

        let consensus = match timeout(
            deadline,
            self.judge
                .deliberate(attempt.safety, &attempt.event, &attempt.candidate, &context),
        )
        .await
        {
            Ok(consensus) => consensus?,
            Err(_) => {
                let reason = format!(
                    "approval timed out after {}s",
                    self.config.approval_timeout_secs
                );
                attempt.record_stage(stage, false, &reason);
                return Ok(StageVerdict::Stop(AttemptOutcome::Rejected { reason }));
            }
        };

        let ratio = consensus.approval_ratio;
        let approved = consensus.approved;
        attempt.votes = consensus.votes;

        if attempt.safety == SafetyCategory::Risky {
            let reason = format!(
                "risky fixes always escalate to a human (advisory approval ratio {ratio:.2})"
            );
            attempt.record_stage(stage, true, &reason);
            return Ok(StageVerdict::Stop(AttemptOutcome::Escalated { reason }));
        }

        if !approved {
            let reason = format!("judges did not reach consensus (approval ratio {ratio:.2})");
            attempt.record_stage(stage, false, &reason);
            return Ok(StageVerdict::Stop(AttemptOutcome::Rejected { reason }));
        }

        attempt.approved = true;
        attempt.auto_apply_allowed = attempt.safety.auto_apply_eligible()
            && self.environment == Environment::Local
            && (ratio - 1.0).abs() < f64::EPSILON;
        attempt.record_stage(
            stage,
            true,
            format!("approved with ratio {ratio:.2}"),
        );
        Ok(StageVerdict::Continue)
    }

    /// Reconcile the preflight reservation against the votes actually cast.
    async fn settle_cost(&self, attempt: &mut FixAttempt, reserved_usd: f64) -> HealResult<()> {
        let actual = self.cost.vote_cost(attempt.votes.len());
        attempt.cost_spent_usd = actual;
        self.cost.commit_actual(reserved_usd, actual).await
    }
}

/// Render any candidate as diff-shaped text for classification and line
/// counting. Commands and file edits classify on their payload lines.
fn candidate_as_diff(candidate: &FixAction) -> String {
    match candidate.action_type {
        ActionType::Diff => candidate.payload.clone(),
        ActionType::Command => format!("+{}", candidate.payload),
        ActionType::FileEdit => candidate
            .as_file_edit()
            .map(|edit| {
                edit.content
                    .lines()
                    .map(|l| format!("+{l}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(|| format!("+{}", candidate.payload)),
    }
}

fn changed_line_count(diff: &str) -> usize {
    diff.lines()
        .filter(|l| {
            (l.starts_with('+') || l.starts_with('-'))
                && !l.starts_with("+++")
                && !l.starts_with("---")
        })
        .count()
}

/// Files a cascade check should consider: the fix targets plus the error's
/// own file.
fn touched_files(attempt: &FixAttempt) -> Vec<String> {
    let mut files = attempt.candidate.target_files.clone();
    if let Some(path) = &attempt.event.file_path {
        if !files.contains(path) {
            files.push(path.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_line_count_ignores_headers() {
        let diff = "--- a/x\n+++ b/x\n+one\n-two\n context\n";
        assert_eq!(changed_line_count(diff), 2);
    }

    #[test]
    fn command_candidates_classify_on_their_text() {
        let action = FixAction::command("pip install requests", vec![]);
        assert_eq!(candidate_as_diff(&action), "+pip install requests");
    }

    #[test]
    fn file_edits_classify_on_their_content() {
        let action = FixAction::file_edit("a.py", "x = 1\ny = 2\n");
        assert_eq!(candidate_as_diff(&action), "+x = 1\n+y = 2");
    }
}
