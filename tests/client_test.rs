//! Facade-level tests: workflow hooks, operator queries, and the audit log.

mod common;

use std::sync::Arc;

use common::{import_error_event, seeded_safe_pattern, test_client, test_config, MockVcs};
use mender::adapters::judges::ScriptedJudgeClient;
use mender::domain::models::{AttemptOutcome, BreakerStatus, Pattern};

fn approve() -> &'static str {
    "VERDICT: approve\nREASONING: trivially safe"
}

#[tokio::test]
async fn subprocess_hook_ignores_clean_exits() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let attempt = client
        .on_subprocess_complete("pytest -q", 0, "4 passed", "test")
        .await;
    assert!(attempt.is_none());
}

#[tokio::test]
async fn subprocess_hook_turns_failures_into_events() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let attempt = client
        .on_subprocess_complete("pytest -q", 1, "E ModuleNotFoundError: foo", "test")
        .await
        .expect("non-zero exit yields an attempt");
    assert!(attempt.event.error_type.starts_with("subprocess:pytest"));
    // Nothing matched and nothing was proposed: rejected, recorded, no crash.
    assert!(matches!(attempt.outcome, AttemptOutcome::Rejected { .. }));
}

#[tokio::test]
async fn phase_hook_processes_each_error() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let event = import_error_event();
    client.store().seed(&[seeded_safe_pattern(&event)]).await.unwrap();

    let attempts = client.on_phase_complete(vec![event]).await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, AttemptOutcome::AutoApplied);
}

#[tokio::test]
async fn every_attempt_lands_in_the_audit_log() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let event = import_error_event();
    client.store().seed(&[seeded_safe_pattern(&event)]).await.unwrap();
    let applied = client.handle(event.clone(), None).await;

    let explained = client.explain(&event.fingerprint).await.unwrap();
    assert!(explained.contains(&applied.id.to_string()));
    assert!(explained.contains("auto_applied"));

    let report = client.status().await.unwrap();
    assert_eq!(report.breaker.status, BreakerStatus::Closed);
    assert_eq!(report.pattern_count, 1);
    assert!(report
        .outcomes_today
        .iter()
        .any(|o| o.outcome == "auto_applied" && o.count == 1));
    assert!(report.budget.spent_usd > 0.0);
}

#[tokio::test]
async fn apply_by_id_dry_run_touches_nothing() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", approve());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let event = import_error_event();
    client.store().seed(&[seeded_safe_pattern(&event)]).await.unwrap();
    let applied = client.handle(event, None).await;
    assert_eq!(vcs.merge_count(), 1);

    let recorded = client.apply_by_id(applied.id, true, false).await.unwrap();
    assert_eq!(recorded.id, applied.id);
    // Dry run: no second merge, no new audit row.
    assert_eq!(vcs.merge_count(), 1);
}

#[tokio::test]
async fn forced_reapply_overrides_a_missing_approval() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    judge.script("claude-sonnet-4-20250514", "VERDICT: reject\nREASONING: cautious");
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs.clone(), None).await;

    let event = import_error_event();
    client.store().seed(&[seeded_safe_pattern(&event)]).await.unwrap();
    let rejected = client.handle(event, None).await;
    assert!(!rejected.approved);

    // Without force the applicator refuses.
    assert!(client.apply_by_id(rejected.id, false, false).await.is_err());

    // Force is an explicit human decision.
    let forced = client.apply_by_id(rejected.id, false, true).await.unwrap();
    assert!(forced.approved);
    assert_ne!(forced.id, rejected.id);
    assert!(matches!(
        forced.outcome,
        AttemptOutcome::AutoApplied | AttemptOutcome::PullRequestOpened { .. }
    ));
}

#[tokio::test]
async fn export_round_trips_through_json() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let event = import_error_event();
    client.store().seed(&[seeded_safe_pattern(&event)]).await.unwrap();

    let dump = client.export().await.unwrap();
    let patterns: Vec<Pattern> = serde_json::from_str(&dump).unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].fingerprint, event.fingerprint);
}

#[tokio::test]
async fn ignore_then_unquarantine_round_trips() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let event = import_error_event();
    client.store().seed(&[seeded_safe_pattern(&event)]).await.unwrap();

    client.ignore(&event.fingerprint, "bad fix").await.unwrap();
    assert!(client.lookup(&event).await.unwrap().is_empty());

    client.unquarantine(&event.fingerprint).await.unwrap();
    assert!(!client.lookup(&event).await.unwrap().is_empty());
}

#[tokio::test]
async fn workflow_complete_reports_the_day() {
    let judge = Arc::new(ScriptedJudgeClient::new());
    let vcs = Arc::new(MockVcs::new());
    let (client, _pool) = test_client(test_config(), judge, vcs, None).await;

    let report = client.on_workflow_complete("phase run finished").await.unwrap();
    assert_eq!(report.pattern_count, 0);
    assert_eq!(report.breaker.status, BreakerStatus::Closed);
}
