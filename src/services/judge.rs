//! Multi-model consensus judging of candidate fixes.
//!
//! Judge count scales with the safety tier. Votes are solicited
//! concurrently; a call failure or unparseable response becomes an ERROR
//! vote that counts against consensus, never a dropped ballot. Dissenting
//! judges get a configurable number of re-deliberation rounds (default one)
//! before the vote is final.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::HealResult;
use crate::domain::models::{
    ErrorEvent, FixAction, JudgeModelConfig, JudgeVote, JudgesConfig, SafetyCategory, Vote,
};
use crate::domain::ports::JudgeClient;

/// Aggregated outcome of a judging round.
#[derive(Debug, Clone)]
pub struct Consensus {
    pub votes: Vec<JudgeVote>,
    pub approved: bool,
    pub approval_ratio: f64,
}

pub struct MultiModelJudge {
    client: Arc<dyn JudgeClient>,
    config: JudgesConfig,
}

impl MultiModelJudge {
    pub fn new(client: Arc<dyn JudgeClient>, config: JudgesConfig) -> Self {
        Self { client, config }
    }

    /// Judges voting for this tier: the first N configured models.
    fn panel(&self, category: SafetyCategory) -> Vec<JudgeModelConfig> {
        let n = category.judge_count().min(self.config.models.len());
        self.config.models[..n].to_vec()
    }

    /// Solicit votes and aggregate a consensus. For RISKY candidates the
    /// caller treats the result as advisory context only; approval here
    /// never auto-gates a RISKY fix.
    pub async fn deliberate(
        &self,
        category: SafetyCategory,
        event: &ErrorEvent,
        candidate: &FixAction,
        context: &str,
    ) -> HealResult<Consensus> {
        let panel = self.panel(category);
        let prompt = build_prompt(event, candidate, context);

        let mut votes = join_all(
            panel
                .iter()
                .map(|judge| self.solicit_vote(judge, prompt.clone())),
        )
        .await;

        let mut consensus = self.tally(votes.clone());

        // Re-deliberation: dissenting judges reconsider once against the
        // majority reasoning, then the vote is final.
        let mut rounds_left = self.config.deliberation_rounds;
        while rounds_left > 0 && !consensus.approved && is_mixed(&votes) {
            votes = self.redeliberate(&panel, &prompt, votes).await;
            consensus = self.tally(votes.clone());
            rounds_left -= 1;
        }

        debug!(
            category = category.as_str(),
            ratio = consensus.approval_ratio,
            approved = consensus.approved,
            "judge consensus"
        );
        Ok(consensus)
    }

    async fn solicit_vote(&self, judge: &JudgeModelConfig, prompt: String) -> JudgeVote {
        match self.client.complete(&judge.model, &prompt).await {
            Ok(raw) => parse_vote(&judge.model, judge.weight, &raw),
            Err(err) => {
                warn!(model = %judge.model, error = %err, "judge call failed");
                JudgeVote {
                    model: judge.model.clone(),
                    vote: Vote::Error,
                    reasoning: format!("judge call failed: {err}"),
                    weight: judge.weight,
                    raw_text: String::new(),
                }
            }
        }
    }

    /// Re-prompt each rejecting judge with the approving majority's
    /// reasoning; approving and errored votes stand.
    async fn redeliberate(
        &self,
        panel: &[JudgeModelConfig],
        prompt: &str,
        votes: Vec<JudgeVote>,
    ) -> Vec<JudgeVote> {
        let majority_reasoning: Vec<String> = votes
            .iter()
            .filter(|v| v.vote == Vote::Approve)
            .map(|v| format!("{}: {}", v.model, v.reasoning))
            .collect();
        let addendum = format!(
            "\n\nOther reviewers approved this fix with the reasoning below. \
             Reconsider your verdict; answer in the same format.\n{}",
            majority_reasoning.join("\n")
        );

        join_all(votes.into_iter().map(|vote| {
            let judge = panel.iter().find(|j| j.model == vote.model).cloned();
            let reprompt = format!("{prompt}{addendum}");
            async move {
                match (vote.vote, judge) {
                    (Vote::Reject, Some(judge)) => self.solicit_vote(&judge, reprompt).await,
                    _ => vote,
                }
            }
        }))
        .await
    }

    /// Weighted consensus: approvals over total weight, with ERROR votes
    /// counting against. Single judge must be unanimous; a panel must clear
    /// the majority threshold strictly.
    fn tally(&self, votes: Vec<JudgeVote>) -> Consensus {
        let total: f64 = votes.iter().map(|v| v.weight).sum();
        let approvals: f64 = votes
            .iter()
            .filter(|v| v.vote == Vote::Approve)
            .map(|v| v.weight)
            .sum();
        let approval_ratio = if total > 0.0 { approvals / total } else { 0.0 };
        let approved = if votes.len() <= 1 {
            approval_ratio >= 1.0 && !votes.is_empty()
        } else {
            approval_ratio > self.config.consensus_threshold
        };
        Consensus {
            votes,
            approved,
            approval_ratio,
        }
    }
}

fn is_mixed(votes: &[JudgeVote]) -> bool {
    votes.iter().any(|v| v.vote == Vote::Approve) && votes.iter().any(|v| v.vote == Vote::Reject)
}

fn build_prompt(event: &ErrorEvent, candidate: &FixAction, context: &str) -> String {
    format!(
        "You are reviewing an automated fix for a software error.\n\n\
         Error: {} - {}\n\
         Proposed fix ({}):\n```\n{}\n```\n\n\
         {}\n\n\
         Answer in exactly this format:\n\
         VERDICT: <approve|reject>\n\
         CONFIDENCE: <0.0-1.0>\n\
         REASONING: <one paragraph>\n",
        event.error_type,
        event.message,
        candidate.action_type.as_str(),
        candidate.payload,
        context,
    )
}

/// Parse a loosely formatted verdict. Looks for a `VERDICT:` marker on any
/// line (tolerating markdown fences and surrounding prose), then falls back
/// to a bare leading APPROVE/REJECT. Anything else is an ERROR vote with
/// the raw text retained for audit.
pub fn parse_vote(model: &str, weight: f64, raw: &str) -> JudgeVote {
    let vote = find_verdict(raw);
    let reasoning = find_reasoning(raw).unwrap_or_else(|| {
        if vote == Vote::Error {
            "unparseable judge response".to_string()
        } else {
            String::new()
        }
    });
    JudgeVote {
        model: model.to_string(),
        vote,
        reasoning,
        weight,
        raw_text: raw.to_string(),
    }
}

/// ASCII case-insensitive prefix strip, safe on arbitrary UTF-8.
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn find_verdict(raw: &str) -> Vote {
    for line in raw.lines() {
        let trimmed = line.trim().trim_start_matches('*').trim();
        if let Some(value) = strip_prefix_ci(trimmed, "verdict:") {
            return classify_verdict_word(value.trim().to_lowercase().as_str());
        }
    }
    // No marker: accept a bare verdict word on its own line.
    for line in raw.lines() {
        match classify_verdict_word(line.trim().to_lowercase().as_str()) {
            Vote::Error => {}
            vote => return vote,
        }
    }
    Vote::Error
}

fn classify_verdict_word(word: &str) -> Vote {
    match word {
        "approve" | "approved" | "yes" => Vote::Approve,
        "reject" | "rejected" | "no" => Vote::Reject,
        _ => Vote::Error,
    }
}

fn find_reasoning(raw: &str) -> Option<String> {
    let mut collected: Vec<&str> = Vec::new();
    let mut collecting = false;
    for line in raw.lines() {
        let trimmed = line.trim().trim_start_matches('*').trim();
        if let Some(rest) = strip_prefix_ci(trimmed, "reasoning:") {
            collecting = true;
            collected.push(rest.trim());
            continue;
        }
        if collecting {
            // Stop at the next marker or fence; keep free-flowing prose.
            if strip_prefix_ci(trimmed, "verdict:").is_some()
                || strip_prefix_ci(trimmed, "confidence:").is_some()
                || trimmed.starts_with("```")
            {
                break;
            }
            collected.push(line);
        }
    }
    let reasoning = collected.join("\n").trim().to_string();
    (!reasoning.is_empty()).then_some(reasoning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::judges::ScriptedJudgeClient;

    fn judge_with(responses: Vec<(&str, &str)>) -> MultiModelJudge {
        let client = ScriptedJudgeClient::new();
        for (model, response) in responses {
            client.script(model, response);
        }
        MultiModelJudge::new(Arc::new(client), JudgesConfig::default())
    }

    fn event() -> ErrorEvent {
        ErrorEvent::new("py:ImportError", "No module named 'foo'", None, vec![], "proj")
    }

    #[test]
    fn parses_well_formed_verdict() {
        let vote = parse_vote("m", 1.0, "VERDICT: approve\nCONFIDENCE: 0.9\nREASONING: small fix\n");
        assert_eq!(vote.vote, Vote::Approve);
        assert_eq!(vote.reasoning, "small fix");
    }

    #[test]
    fn parses_verdict_embedded_in_prose_and_fences() {
        let raw = "Let me think about this change.\n```\nVERDICT: reject\nREASONING: touches auth\n```\nHope that helps!";
        let vote = parse_vote("m", 1.0, raw);
        assert_eq!(vote.vote, Vote::Reject);
        assert_eq!(vote.reasoning, "touches auth");
    }

    #[test]
    fn parses_bare_verdict_word() {
        let vote = parse_vote("m", 1.0, "APPROVE\nlooks fine to me");
        assert_eq!(vote.vote, Vote::Approve);
    }

    #[test]
    fn malformed_response_is_an_error_vote() {
        let vote = parse_vote("m", 1.0, "I am not sure what to say about this.");
        assert_eq!(vote.vote, Vote::Error);
        assert!(!vote.raw_text.is_empty());
    }

    #[tokio::test]
    async fn safe_tier_uses_a_single_judge() {
        let judge = judge_with(vec![(
            "claude-sonnet-4-20250514",
            "VERDICT: approve\nREASONING: ok",
        )]);
        let consensus = judge
            .deliberate(
                SafetyCategory::Safe,
                &event(),
                &FixAction::command("true", vec![]),
                "",
            )
            .await
            .unwrap();
        assert_eq!(consensus.votes.len(), 1);
        assert!(consensus.approved);
    }

    #[tokio::test]
    async fn single_judge_must_be_unanimous() {
        let judge = judge_with(vec![(
            "claude-sonnet-4-20250514",
            "VERDICT: reject\nREASONING: no",
        )]);
        let consensus = judge
            .deliberate(
                SafetyCategory::Safe,
                &event(),
                &FixAction::command("true", vec![]),
                "",
            )
            .await
            .unwrap();
        assert!(!consensus.approved);
    }

    #[tokio::test]
    async fn error_votes_count_against_consensus() {
        let judge = judge_with(vec![
            ("claude-sonnet-4-20250514", "VERDICT: approve\nREASONING: ok"),
            ("claude-3-5-haiku-20241022", "garbled nonsense"),
        ]);
        let consensus = judge
            .deliberate(
                SafetyCategory::Moderate,
                &event(),
                &FixAction::command("true", vec![]),
                "",
            )
            .await
            .unwrap();
        assert_eq!(consensus.votes.len(), 2);
        // 1.0 approval weight out of 2.0 total does not clear a 0.5 majority.
        assert!(!consensus.approved);
        assert!(consensus.votes.iter().any(|v| v.vote == Vote::Error));
    }

    #[tokio::test]
    async fn two_of_two_approvals_pass_a_panel() {
        let judge = judge_with(vec![
            ("claude-sonnet-4-20250514", "VERDICT: approve\nREASONING: ok"),
            ("claude-3-5-haiku-20241022", "VERDICT: approve\nREASONING: fine"),
        ]);
        let consensus = judge
            .deliberate(
                SafetyCategory::Moderate,
                &event(),
                &FixAction::command("true", vec![]),
                "",
            )
            .await
            .unwrap();
        assert!(consensus.approved);
        assert!((consensus.approval_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn dissenting_judge_gets_one_reconsideration() {
        let client = ScriptedJudgeClient::new();
        client.script("claude-sonnet-4-20250514", "VERDICT: approve\nREASONING: ok");
        // First answer rejects, the re-deliberation answer approves.
        client.script_sequence(
            "claude-3-5-haiku-20241022",
            vec![
                "VERDICT: reject\nREASONING: unsure about scope",
                "VERDICT: approve\nREASONING: convinced by the other review",
            ],
        );
        let judge = MultiModelJudge::new(Arc::new(client), JudgesConfig::default());
        let consensus = judge
            .deliberate(
                SafetyCategory::Moderate,
                &event(),
                &FixAction::command("true", vec![]),
                "",
            )
            .await
            .unwrap();
        assert!(consensus.approved);
    }
}
