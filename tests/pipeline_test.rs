//! End-to-end pipeline tests: preflight gates, verification, consensus
//! approval, and environment-aware application.

mod common;

use std::sync::Arc;

use common::{
    import_error_event, seeded_safe_pattern, test_client, test_config, MockVcs, StaticEmbedder,
};
use mender::adapters::judges::ScriptedJudgeClient;
use mender::domain::models::{
    AttemptOutcome, Environment, ErrorEvent, FixAction, Pattern, SafetyCategory,
};
use mender::PatternStore;

fn approve() -> &'static str {
    "VERDICT: approve\nCONFIDENCE: 0.9\nREASONING: matches a known benign pattern"
}

fn reject() -> &'static str {
    "VERDICT: reject\nCONFIDENCE: 0.8\nREASONING: not convinced this is safe"
}

async fn seed(store: &PatternStore, pattern: &Pattern) {
    store.seed(std::slice::from_ref(pattern)).await.unwrap();
}

#[tokio::test]
async fn safe_local_unanimous_fix_merges_directly() {
    // Scenario C: SAFE + local + 1/1 approval merges without a PR.
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let event = import_error_event();
    seed(client.store(), &seeded_safe_pattern(&event)).await;

    let attempt = client.handle(event, None).await;
    assert_eq!(attempt.outcome, AttemptOutcome::AutoApplied);
    assert_eq!(vcs.merge_count(), 1);
    assert_eq!(vcs.pr_count(), 0);
}

#[tokio::test]
async fn moderate_approval_still_requires_a_pull_request() {
    // Scenario D: MODERATE with 2/2 approvals opens a PR, never merges.
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    judge.script("claude-3-5-haiku-20241022", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let event = import_error_event();
    let pattern = Pattern::new(
        event.fingerprint.clone(),
        FixAction::diff(
            "--- a/src/app.py\n+++ b/src/app.py\n+    if retries > 3:\n+        raise\n",
            vec!["src/app.py".to_string()],
        ),
        SafetyCategory::Moderate,
    );
    seed(client.store(), &pattern).await;

    let attempt = client.handle(event, None).await;
    assert!(matches!(attempt.outcome, AttemptOutcome::PullRequestOpened { .. }));
    assert_eq!(vcs.pr_count(), 1);
    assert_eq!(vcs.merge_count(), 0);
}

#[tokio::test]
async fn risky_fix_escalates_despite_unanimous_approval() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    judge.script("claude-3-5-haiku-20241022", approve());
    judge.script("claude-opus-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let event = import_error_event();
    let pattern = Pattern::new(
        event.fingerprint.clone(),
        FixAction::diff(
            "--- a/.env\n+++ b/.env\n+API_TOKEN=abc\n",
            vec![".env".to_string()],
        ),
        SafetyCategory::Risky,
    );
    seed(client.store(), &pattern).await;

    let attempt = client.handle(event, None).await;
    assert!(matches!(attempt.outcome, AttemptOutcome::Escalated { .. }));
    assert_eq!(attempt.safety, SafetyCategory::Risky);
    // Votes were collected as advisory context but nothing landed.
    assert_eq!(attempt.votes.len(), 3);
    assert_eq!(vcs.merge_count(), 0);
    assert_eq!(vcs.pr_count(), 0);
}

#[tokio::test]
async fn rejected_consensus_blocks_application() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", reject());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let event = import_error_event();
    seed(client.store(), &seeded_safe_pattern(&event)).await;

    let attempt = client.handle(event, None).await;
    assert!(matches!(attempt.outcome, AttemptOutcome::Rejected { .. }));
    assert!(!attempt.approved);
    assert_eq!(vcs.merge_count(), 0);
}

#[tokio::test]
async fn cascade_on_recently_fixed_file_escalates() {
    // Scenario E: a file fixed moments ago escalates the next error on it.
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let first = import_error_event();
    seed(client.store(), &seeded_safe_pattern(&first)).await;
    let applied = client.handle(first, None).await;
    assert_eq!(applied.outcome, AttemptOutcome::AutoApplied);

    // A new error on the same file, moments later.
    let second = ErrorEvent::new(
        "py:AttributeError",
        "'NoneType' object has no attribute 'run'",
        Some("src/app.py".to_string()),
        vec!["src/app.py:22:main".to_string()],
        "test",
    );
    let pattern = Pattern::new(
        second.fingerprint.clone(),
        FixAction::diff(
            "--- a/src/app.py\n+++ b/src/app.py\n+# guard against missing runner\n",
            vec!["src/app.py".to_string()],
        ),
        SafetyCategory::Safe,
    );
    seed(client.store(), &pattern).await;

    let attempt = client.handle(second, None).await;
    assert!(matches!(attempt.outcome, AttemptOutcome::Escalated { .. }));
    let reason = match &attempt.outcome {
        AttemptOutcome::Escalated { reason } => reason.clone(),
        _ => unreachable!(),
    };
    assert!(reason.contains("cascade") || reason.contains("hot"));
}

#[tokio::test]
async fn unprecedented_candidate_is_rejected() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    // Candidate proposed externally, no stored pattern, no occurrences.
    let event = import_error_event();
    let candidate = FixAction::diff(
        "--- a/src/app.py\n+++ b/src/app.py\n+# annotate\n",
        vec!["src/app.py".to_string()],
    );

    let attempt = client.handle(event, Some(candidate)).await;
    match attempt.outcome {
        AttemptOutcome::Rejected { reason } => {
            assert!(reason.contains("precedent"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_candidate_is_rejected_not_crashed() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let attempt = client.handle(import_error_event(), None).await;
    match attempt.outcome {
        AttemptOutcome::Rejected { reason } => assert!(reason.contains("no candidate")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_fixes_fail_the_hard_constraints() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let event = import_error_event();
    let big_diff: String = (0..40).map(|i| format!("+line {i}\n")).collect();
    let pattern = Pattern::new(
        event.fingerprint.clone(),
        FixAction::diff(big_diff, vec!["src/app.py".to_string()]),
        SafetyCategory::Moderate,
    );
    seed(client.store(), &pattern).await;

    let attempt = client.handle(event, None).await;
    match attempt.outcome {
        AttemptOutcome::Rejected { reason } => assert!(reason.contains("lines")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn budget_exhaustion_rejects_before_any_judging() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());

    let mut config = test_config();
    // Exactly one SAFE validation fits: 1 judge * 0.05 + 0.01 lookup.
    config.budget.daily_limit_usd = 0.06;
    let (client, _pool) = test_client(config, judge.clone(), vcs, None).await;

    let event = import_error_event();
    seed(client.store(), &seeded_safe_pattern(&event)).await;

    let first = client.handle(event.clone(), None).await;
    assert_eq!(first.outcome, AttemptOutcome::AutoApplied);

    // Different file so the cascade gate stays out of the way.
    let second_event = ErrorEvent::new(
        "py:ModuleNotFoundError",
        "No module named 'bar'",
        None,
        vec!["src/other.py:3:load".to_string()],
        "test",
    );
    let pattern = Pattern::new(
        second_event.fingerprint.clone(),
        FixAction::diff(
            "--- a/src/other.py\n+++ b/src/other.py\n+# note\n",
            vec!["src/other.py".to_string()],
        ),
        SafetyCategory::Safe,
    );
    seed(client.store(), &pattern).await;

    let calls_before = judge.calls().len();
    let second = client.handle(second_event, None).await;
    match second.outcome {
        AttemptOutcome::Rejected { reason } => assert!(reason.contains("budget")),
        other => panic!("expected budget rejection, got {other:?}"),
    }
    // No approval-stage cost was spent.
    assert_eq!(judge.calls().len(), calls_before);
}

#[tokio::test]
async fn failed_post_apply_verification_rolls_back() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());

    let mut config = test_config();
    // The narrowed post-apply check fails even though full verification passes.
    config.pipeline.checks.push(mender::domain::models::CheckConfig {
        name: "narrow".to_string(),
        command: "false".to_string(),
        required: false,
    });
    config.pipeline.post_apply_check = "narrow".to_string();
    let (client, _pool) = test_client(config, judge, vcs.clone(), None).await;

    let event = import_error_event();
    seed(client.store(), &seeded_safe_pattern(&event)).await;

    let attempt = client.handle(event.clone(), None).await;
    assert!(matches!(attempt.outcome, AttemptOutcome::RolledBack { .. }));
    assert_eq!(vcs.revert_count(), 1);
    assert!(attempt.rollback.is_some());

    // The failure was recorded against the pattern.
    let stored = client.store().get(&event.fingerprint).await.unwrap().unwrap();
    assert_eq!(stored.failure_count, 1);
}

#[tokio::test]
async fn kill_switch_blocks_everything() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    let vcs = Arc::new(MockVcs::new());
    let mut config = test_config();
    config.kill_switch = true;
    let (client, _pool) = test_client(config, judge, vcs, None).await;

    let event = import_error_event();
    seed(client.store(), &seeded_safe_pattern(&event)).await;

    let attempt = client.handle(event, None).await;
    match attempt.outcome {
        AttemptOutcome::Rejected { reason } => assert!(reason.contains("kill switch")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn hosted_environment_never_merges_directly() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let mut config = test_config();
    config.environment = Environment::Hosted;
    let (client, _pool) = test_client(config, judge, vcs.clone(), None).await;

    let event = import_error_event();
    seed(client.store(), &seeded_safe_pattern(&event)).await;

    let attempt = client.handle(event, None).await;
    // SAFE and unanimous, but hosted: pull request, not merge.
    assert!(matches!(attempt.outcome, AttemptOutcome::PullRequestOpened { .. }));
    assert_eq!(vcs.merge_count(), 0);
    assert_eq!(vcs.pr_count(), 1);
}

#[tokio::test]
async fn pull_request_body_cites_pattern_and_votes() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    judge.script("claude-3-5-haiku-20241022", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let event = import_error_event();
    let pattern = Pattern::new(
        event.fingerprint.clone(),
        FixAction::diff(
            "--- a/src/app.py\n+++ b/src/app.py\n+    if retries > 3:\n+        raise\n",
            vec!["src/app.py".to_string()],
        ),
        SafetyCategory::Moderate,
    );
    seed(client.store(), &pattern).await;

    let attempt = client.handle(event.clone(), None).await;
    assert!(matches!(attempt.outcome, AttemptOutcome::PullRequestOpened { .. }));

    let prs = vcs.pull_requests.lock().unwrap();
    let (_, body) = prs.first().unwrap();
    assert!(body.contains(&event.fingerprint));
    assert!(body.contains("Judge votes"));
    assert!(body.contains("approve"));
}

#[tokio::test]
async fn semantic_match_supplies_the_candidate_fix() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());

    let embedder = Arc::new(StaticEmbedder::new(vec![0.9, (1.0_f32 - 0.81).sqrt()]));
    let mut config = test_config();
    config.embedding.enabled = true;
    let (client, _pool) = test_client(config, judge, vcs.clone(), Some(embedder)).await;

    // A semantically close pattern under a different fingerprint.
    let pattern = Pattern::new(
        "fp-other",
        FixAction::diff(
            "--- a/src/app.py\n+++ b/src/app.py\n+# clarify\n",
            vec!["src/app.py".to_string()],
        ),
        SafetyCategory::Safe,
    )
    .with_embedding(vec![1.0, 0.0]);
    seed(client.store(), &pattern).await;

    let event = import_error_event();
    let attempt = client.handle(event.clone(), None).await;

    assert_eq!(attempt.outcome, AttemptOutcome::AutoApplied);
    assert_eq!(attempt.matched_fingerprint.as_deref(), Some("fp-other"));

    // The cross-fingerprint resolution left a causality edge behind.
    let edges = client
        .lookup(&event)
        .await
        .unwrap()
        .causal_context;
    assert!(edges
        .iter()
        .any(|e| e.effect_fingerprint == "fp-other" && e.cause_fingerprint == event.fingerprint));
}
