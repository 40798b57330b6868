//! Fix attempt audit records.
//!
//! An attempt is created when the pipeline starts, accumulates stage
//! reports and judge votes, and is finalized and appended to the audit log
//! when the pipeline ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error_event::ErrorEvent;
use super::pattern::FixAction;
use super::safety::SafetyCategory;

/// A single judge's verdict on a candidate fix.
///
/// Malformed model output never throws: it becomes an `Error` vote with the
/// raw text retained for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Approve,
    Reject,
    Error,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeVote {
    pub model: String,
    pub vote: Vote,
    pub reasoning: String,
    pub weight: f64,
    /// Raw model output, kept verbatim for audit.
    pub raw_text: String,
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    PreFlight,
    Verification,
    Approval,
    Apply,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreFlight => "pre_flight",
            Self::Verification => "verification",
            Self::Approval => "approval",
            Self::Apply => "apply",
            Self::Done => "done",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pre_flight" => Some(Self::PreFlight),
            "verification" => Some(Self::Verification),
            "approval" => Some(Self::Approval),
            "apply" => Some(Self::Apply),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Structured reason emitted by each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub passed: bool,
    pub reason: String,
}

/// Final disposition of an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Pipeline still in flight; never persisted as a final state.
    Pending,
    /// Merged directly (SAFE fix, local environment, unanimous approval).
    AutoApplied,
    /// Applied on a branch and a pull request was opened.
    PullRequestOpened { url: String },
    Rejected { reason: String },
    Escalated { reason: String },
    /// Applied, then post-apply verification failed and the fix was reverted.
    RolledBack { reason: String },
}

impl AttemptOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AutoApplied => "auto_applied",
            Self::PullRequestOpened { .. } => "pull_request_opened",
            Self::Rejected { .. } => "rejected",
            Self::Escalated { .. } => "escalated",
            Self::RolledBack { .. } => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Rollback bookkeeping for applied-then-reverted attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackInfo {
    pub reverted: bool,
    pub detail: String,
}

/// Audit record for one pass of an error through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    pub id: Uuid,
    pub event: ErrorEvent,
    pub candidate: FixAction,
    pub safety: SafetyCategory,
    pub votes: Vec<JudgeVote>,
    pub stage_reached: PipelineStage,
    pub stage_reports: Vec<StageReport>,
    pub outcome: AttemptOutcome,
    /// Pipeline verdict: the applicator refuses attempts without it.
    pub approved: bool,
    /// Approved *and* eligible for direct merge (SAFE + local + unanimous).
    pub auto_apply_allowed: bool,
    /// This attempt is the circuit breaker's single half-open probe.
    pub is_probe: bool,
    /// Fingerprint of the matched pattern, when lookup found one.
    pub matched_fingerprint: Option<String>,
    pub cost_spent_usd: f64,
    pub rollback: Option<RollbackInfo>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl FixAttempt {
    pub fn new(event: ErrorEvent, candidate: FixAction, safety: SafetyCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            candidate,
            safety,
            votes: Vec::new(),
            stage_reached: PipelineStage::PreFlight,
            stage_reports: Vec::new(),
            outcome: AttemptOutcome::Pending,
            approved: false,
            auto_apply_allowed: false,
            is_probe: false,
            matched_fingerprint: None,
            cost_spent_usd: 0.0,
            rollback: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_stage(&mut self, stage: PipelineStage, passed: bool, reason: impl Into<String>) {
        self.stage_reached = stage;
        self.stage_reports.push(StageReport {
            stage,
            passed,
            reason: reason.into(),
        });
    }

    pub fn finalize(&mut self, outcome: AttemptOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }

    /// Human-readable explanation assembled from the stage reports.
    pub fn explain(&self) -> String {
        let mut lines = vec![format!(
            "attempt {} [{}] outcome={}",
            self.id,
            self.safety.as_str(),
            self.outcome.kind()
        )];
        for report in &self.stage_reports {
            lines.push(format!(
                "  {}: {} - {}",
                report.stage.as_str(),
                if report.passed { "pass" } else { "fail" },
                report.reason
            ));
        }
        for vote in &self.votes {
            lines.push(format!(
                "  vote {} [{}] weight={:.1}: {}",
                vote.model,
                vote.vote.as_str(),
                vote.weight,
                vote.reasoning
            ));
        }
        lines.join("\n")
    }
}
