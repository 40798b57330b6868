//! Stored error→fix associations and the causality graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::safety::SafetyCategory;

/// Kind of candidate fix carried by a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Unified diff applied to the working tree.
    Diff,
    /// Shell command executed in the project root.
    Command,
    /// Whole-file replacement; payload is JSON `{path, content}`.
    FileEdit,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diff => "diff",
            Self::Command => "command",
            Self::FileEdit => "file_edit",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "diff" => Some(Self::Diff),
            "command" => Some(Self::Command),
            "file_edit" => Some(Self::FileEdit),
            _ => None,
        }
    }
}

/// A concrete candidate fix. Owned by the proposing pattern and attached
/// transiently to a fix attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAction {
    pub action_type: ActionType,
    pub payload: String,
    pub target_files: Vec<String>,
}

/// Payload of a `FileEdit` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: String,
    pub content: String,
}

impl FixAction {
    pub fn diff(payload: impl Into<String>, target_files: Vec<String>) -> Self {
        Self {
            action_type: ActionType::Diff,
            payload: payload.into(),
            target_files,
        }
    }

    pub fn command(payload: impl Into<String>, target_files: Vec<String>) -> Self {
        Self {
            action_type: ActionType::Command,
            payload: payload.into(),
            target_files,
        }
    }

    pub fn file_edit(path: impl Into<String>, content: impl Into<String>) -> Self {
        let edit = FileEdit {
            path: path.into(),
            content: content.into(),
        };
        let target_files = vec![edit.path.clone()];
        Self {
            action_type: ActionType::FileEdit,
            payload: serde_json::to_string(&edit).unwrap_or_default(),
            target_files,
        }
    }

    /// Parse a `FileEdit` payload. `None` for other action types or
    /// malformed payloads.
    pub fn as_file_edit(&self) -> Option<FileEdit> {
        if self.action_type != ActionType::FileEdit {
            return None;
        }
        serde_json::from_str(&self.payload).ok()
    }
}

/// A stored error→fix association with aggregated outcome statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub fingerprint: String,
    /// Semantic embedding of the originating error text, when available.
    pub embedding: Option<Vec<f32>>,
    pub fix: FixAction,
    pub safety: SafetyCategory,
    pub occurrence_count: u32,
    pub success_count: u32,
    pub failure_count: u32,
    /// Failures since the last success; drives auto-quarantine.
    pub consecutive_failures: u32,
    /// Quarantined patterns are excluded from Tier-1 lookup until reset.
    pub quarantined: bool,
    pub quarantine_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Pattern {
    pub fn new(fingerprint: impl Into<String>, fix: FixAction, safety: SafetyCategory) -> Self {
        let now = Utc::now();
        Self {
            fingerprint: fingerprint.into(),
            embedding: None,
            fix,
            safety,
            occurrence_count: 1,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            quarantined: false,
            quarantine_reason: None,
            created_at: now,
            last_seen_at: now,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Fraction of recorded apply outcomes that succeeded.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return 0.0;
        }
        f64::from(self.success_count) / f64::from(total)
    }
}

/// Directed edge in the causality graph: observing `cause` preceded
/// observing `effect`. Read-only for Tier-3 lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalityEdge {
    pub cause_fingerprint: String,
    pub effect_fingerprint: String,
    pub observed_at: DateTime<Utc>,
    pub depth: u32,
}

/// Which lookup tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Semantic,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
        }
    }
}

/// A pattern matched during lookup, with the tier that found it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern: Pattern,
    pub tier: MatchTier,
    /// Cosine similarity for semantic matches; 1.0 for exact hits.
    pub similarity: f32,
}

/// Result of a three-tier lookup. Matches come from the first non-empty of
/// Tier 1/Tier 2; causal context is always attached and never auto-applied
/// by itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupResult {
    pub matches: Vec<PatternMatch>,
    pub causal_context: Vec<CausalityEdge>,
}

impl LookupResult {
    pub fn best(&self) -> Option<&PatternMatch> {
        self.matches.first()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_handles_zero_outcomes() {
        let p = Pattern::new("fp", FixAction::command("true", vec![]), SafetyCategory::Safe);
        assert!((p.success_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn file_edit_payload_round_trips() {
        let action = FixAction::file_edit("src/config.py", "TIMEOUT = 30\n");
        let edit = action.as_file_edit().unwrap();
        assert_eq!(edit.path, "src/config.py");
        assert_eq!(edit.content, "TIMEOUT = 30\n");
        assert_eq!(action.target_files, vec!["src/config.py".to_string()]);
    }

    #[test]
    fn as_file_edit_rejects_other_kinds() {
        let action = FixAction::diff("--- a\n+++ b\n", vec!["a".into()]);
        assert!(action.as_file_edit().is_none());
    }
}
