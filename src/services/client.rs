//! Top-level healing facade composing lookup, pipeline, and applicator.
//!
//! External collaborators (the workflow engine's hooks, the operator CLI)
//! talk to this type only. No failure escapes `handle` uncaught: every
//! outcome folds into the attempt's audit record.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::errors::{HealError, HealResult};
use crate::domain::models::{
    AttemptOutcome, Budget, CircuitBreakerState, ErrorEvent, FixAction, FixAttempt, LookupResult,
    PipelineStage, SafetyCategory,
};
use crate::domain::ports::{AttemptRepository, OutcomeCount};
use crate::services::applicator::FixApplicator;
use crate::services::breaker::CircuitBreaker;
use crate::services::cost::CostTracker;
use crate::services::lookup::PatternStore;
use crate::services::pipeline::ValidationPipeline;

/// Aggregate status snapshot for operators.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub breaker: CircuitBreakerState,
    pub budget: Budget,
    pub pattern_count: i64,
    pub outcomes_today: Vec<OutcomeCount>,
}

pub struct HealingClient {
    store: Arc<PatternStore>,
    pipeline: Arc<ValidationPipeline>,
    applicator: Arc<FixApplicator>,
    attempts: Arc<dyn AttemptRepository>,
    breaker: Arc<CircuitBreaker>,
    cost: Arc<CostTracker>,
}

impl HealingClient {
    pub fn new(
        store: Arc<PatternStore>,
        pipeline: Arc<ValidationPipeline>,
        applicator: Arc<FixApplicator>,
        attempts: Arc<dyn AttemptRepository>,
        breaker: Arc<CircuitBreaker>,
        cost: Arc<CostTracker>,
    ) -> Self {
        Self {
            store,
            pipeline,
            applicator,
            attempts,
            breaker,
            cost,
        }
    }

    /// Three-tier lookup, exposed to collaborators directly.
    pub async fn lookup(&self, event: &ErrorEvent) -> HealResult<LookupResult> {
        self.store.lookup(event).await
    }

    /// Match, validate, and (when approved) apply a fix for `event`.
    /// `candidate` overrides the matched pattern's fix when provided.
    /// Infallible by contract: every failure folds into the returned
    /// attempt and its audit record.
    pub async fn handle(&self, event: ErrorEvent, candidate: Option<FixAction>) -> FixAttempt {
        let mut attempt = match self.run(event, candidate).await {
            Ok(attempt) => attempt,
            Err((event, err)) => {
                // Terminal safety net: record the internal failure.
                warn!(error = %err, "healing pipeline failed internally");
                let mut attempt = FixAttempt::new(
                    event,
                    FixAction::command("", vec![]),
                    SafetyCategory::Moderate,
                );
                attempt.record_stage(PipelineStage::PreFlight, false, err.to_string());
                attempt.finalize(AttemptOutcome::Rejected {
                    reason: format!("internal error: {err}"),
                });
                attempt
            }
        };

        if !attempt.outcome.is_terminal() {
            // The pipeline approved but nothing landed; never persist a
            // pending record.
            attempt.finalize(AttemptOutcome::Rejected {
                reason: "pipeline ended without a terminal outcome".to_string(),
            });
        }

        if let Err(err) = self.attempts.append(&attempt).await {
            error!(error = %err, attempt = %attempt.id, "failed to append audit record");
        }
        attempt
    }

    async fn run(
        &self,
        event: ErrorEvent,
        candidate: Option<FixAction>,
    ) -> Result<FixAttempt, (ErrorEvent, HealError)> {
        let lookup = match self.store.lookup(&event).await {
            Ok(lookup) => lookup,
            Err(err) => return Err((event, err)),
        };
        let matched_fingerprint = lookup.best().map(|m| m.pattern.fingerprint.clone());

        let candidate = match candidate.or_else(|| lookup.best().map(|m| m.pattern.fix.clone())) {
            Some(candidate) => candidate,
            None => {
                let mut attempt = FixAttempt::new(
                    event,
                    FixAction::command("", vec![]),
                    SafetyCategory::Moderate,
                );
                attempt.record_stage(
                    PipelineStage::PreFlight,
                    false,
                    "no candidate fix: no pattern matched and none was proposed",
                );
                attempt.finalize(AttemptOutcome::Rejected {
                    reason: "no candidate fix available".to_string(),
                });
                return Ok(attempt);
            }
        };

        let mut attempt = match self
            .pipeline
            .validate(&event, candidate, matched_fingerprint.clone())
            .await
        {
            Ok(attempt) => attempt,
            Err(err) => return Err((event, err)),
        };

        // The lookup led to a recorded attempt; count the occurrence.
        if let Some(fingerprint) = &matched_fingerprint {
            if let Err(err) = self.store.record_occurrence(fingerprint).await {
                warn!(error = %err, "failed to record pattern occurrence");
            }
        }

        if attempt.approved {
            attempt.stage_reached = PipelineStage::Apply;
            if let Err(err) = self.applicator.apply(&mut attempt).await {
                attempt.finalize(AttemptOutcome::Rejected {
                    reason: format!("apply refused: {err}"),
                });
            } else if matches!(
                attempt.outcome,
                AttemptOutcome::AutoApplied | AttemptOutcome::PullRequestOpened { .. }
            ) {
                attempt.stage_reached = PipelineStage::Done;
            }
        }

        Ok(attempt)
    }

    /// Workflow hook: a phase finished and surfaced zero or more errors.
    pub async fn on_phase_complete(&self, errors: Vec<ErrorEvent>) -> Vec<FixAttempt> {
        let mut attempts = Vec::with_capacity(errors.len());
        for event in errors {
            attempts.push(self.handle(event, None).await);
        }
        attempts
    }

    /// Workflow hook: a subprocess finished. Non-zero exits become error
    /// events fed through the healing path.
    pub async fn on_subprocess_complete(
        &self,
        cmd: &str,
        exit_code: i32,
        output: &str,
        project_id: &str,
    ) -> Option<FixAttempt> {
        if exit_code == 0 {
            return None;
        }
        let program = cmd.split_whitespace().next().unwrap_or("unknown");
        let tail: Vec<&str> = output.lines().rev().take(5).collect();
        let message: String = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
        let event = ErrorEvent::new(
            format!("subprocess:{program}"),
            format!("exit {exit_code}: {message}"),
            None,
            vec![],
            project_id,
        );
        Some(self.handle(event, None).await)
    }

    /// Workflow hook: the workflow finished; log the day's aggregate.
    pub async fn on_workflow_complete(&self, summary: &str) -> HealResult<StatusReport> {
        let report = self.status().await?;
        info!(
            summary,
            breaker = report.breaker.status.as_str(),
            spent_usd = report.budget.spent_usd,
            "workflow complete"
        );
        Ok(report)
    }

    /// Operator status query.
    pub async fn status(&self) -> HealResult<StatusReport> {
        Ok(StatusReport {
            breaker: self.breaker.current_state().await?,
            budget: self.cost.snapshot().await?,
            pattern_count: self.store.count().await?,
            outcomes_today: self.attempts.outcome_counts_today().await?,
        })
    }

    /// Operator: re-apply a recorded attempt by id.
    pub async fn apply_by_id(
        &self,
        id: uuid::Uuid,
        dry_run: bool,
        force: bool,
    ) -> HealResult<FixAttempt> {
        crate::services::applicator::reapply_recorded(
            &self.applicator,
            self.attempts.as_ref(),
            id,
            dry_run,
            force,
        )
        .await
    }

    /// Operator: quarantine a pattern with a reason.
    pub async fn ignore(&self, fingerprint: &str, reason: &str) -> HealResult<()> {
        self.store.quarantine(fingerprint, reason).await
    }

    /// Operator: reinstate a quarantined pattern.
    pub async fn unquarantine(&self, fingerprint: &str) -> HealResult<()> {
        self.store.unquarantine(fingerprint).await
    }

    /// Operator: explain the stored pattern and the recent attempts for a
    /// fingerprint.
    pub async fn explain(&self, fingerprint: &str) -> HealResult<String> {
        let pattern = self.store.get(fingerprint).await?;
        let attempts = self.attempts.by_fingerprint(fingerprint).await?;

        let mut lines = Vec::new();
        match pattern {
            Some(p) => lines.push(format!(
                "pattern {} [{}] occurrences={} successes={} failures={} quarantined={}{}",
                p.fingerprint,
                p.safety.as_str(),
                p.occurrence_count,
                p.success_count,
                p.failure_count,
                p.quarantined,
                p.quarantine_reason
                    .as_deref()
                    .map(|r| format!(" ({r})"))
                    .unwrap_or_default(),
            )),
            None => lines.push(format!("no stored pattern for {fingerprint}")),
        }
        for attempt in attempts.iter().take(10) {
            lines.push(attempt.explain());
        }
        Ok(lines.join("\n\n"))
    }

    /// Operator: structured dump of every stored pattern.
    pub async fn export(&self) -> HealResult<String> {
        let patterns = self.store.export().await?;
        Ok(serde_json::to_string_pretty(&patterns)?)
    }

    /// Backfill: replay one historical event through the lookup/record
    /// path. Returns whether a pattern matched.
    pub async fn replay_one(&self, event: &ErrorEvent) -> HealResult<bool> {
        self.store.replay_event(event).await
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }
}
