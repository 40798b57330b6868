//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;

use mender::adapters::judges::ScriptedJudgeClient;
use mender::adapters::sqlite::create_migrated_test_pool;
use mender::domain::errors::{HealError, HealResult};
use mender::domain::models::{
    CheckConfig, Config, Environment, ErrorEvent, FixAction, Pattern, SafetyCategory,
};
use mender::domain::ports::{CommandOutput, EmbeddingProvider, VcsProvider};
use mender::infrastructure::setup::build_healing_client_with;
use mender::HealingClient;

/// Version-control stub that records every interaction.
#[derive(Default)]
pub struct MockVcs {
    pub applied_diffs: Mutex<Vec<String>>,
    pub written_files: Mutex<Vec<String>>,
    pub commands: Mutex<Vec<String>>,
    pub merges: Mutex<Vec<String>>,
    pub pull_requests: Mutex<Vec<(String, String)>>,
    pub reverts: AtomicUsize,
    pub fail_apply: bool,
}

impl MockVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_apply() -> Self {
        Self {
            fail_apply: true,
            ..Self::default()
        }
    }

    pub fn merge_count(&self) -> usize {
        self.merges.lock().unwrap().len()
    }

    pub fn pr_count(&self) -> usize {
        self.pull_requests.lock().unwrap().len()
    }

    pub fn revert_count(&self) -> usize {
        self.reverts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VcsProvider for MockVcs {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supports_direct_merge(&self) -> bool {
        true
    }

    async fn apply_diff(&self, diff: &str) -> HealResult<()> {
        if self.fail_apply {
            return Err(HealError::Apply("mock apply failure".to_string()));
        }
        self.applied_diffs.lock().unwrap().push(diff.to_string());
        Ok(())
    }

    async fn run_command(&self, command: &str) -> HealResult<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(CommandOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn write_file(&self, path: &str, _content: &str) -> HealResult<()> {
        self.written_files.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn open_pull_request(&self, title: &str, body: &str) -> HealResult<String> {
        self.pull_requests
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok("https://forge.test/pr/1".to_string())
    }

    async fn merge(&self, message: &str) -> HealResult<()> {
        self.merges.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn revert(&self) -> HealResult<()> {
        self.reverts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Embedding stub with fixed vectors per text and a call counter.
pub struct StaticEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    fallback: Vec<f32>,
    pub calls: AtomicUsize,
}

impl StaticEmbedder {
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: Mutex::new(HashMap::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, text: &str, vector: Vec<f32>) {
        self.vectors
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    fn name(&self) -> &'static str {
        "static"
    }

    fn dimension(&self) -> usize {
        self.fallback.len()
    }

    async fn embed(&self, text: &str) -> HealResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vectors = self.vectors.lock().unwrap();
        Ok(vectors.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Test config: in-memory-friendly, trivially passing verification checks.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.environment = Environment::Local;
    config.project_id = "test".to_string();
    config.pipeline.checks = vec![
        CheckConfig {
            name: "build".to_string(),
            command: "true".to_string(),
            required: true,
        },
        CheckConfig {
            name: "test".to_string(),
            command: "true".to_string(),
            required: true,
        },
    ];
    config.pipeline.post_apply_check = "test".to_string();
    config
}

pub async fn test_pool() -> SqlitePool {
    create_migrated_test_pool().await.unwrap()
}

/// Full client wired against mocks. Returns the handles tests assert on.
pub async fn test_client(
    config: Config,
    judge: Arc<ScriptedJudgeClient>,
    vcs: Arc<MockVcs>,
    embedder: Option<Arc<StaticEmbedder>>,
) -> (HealingClient, SqlitePool) {
    let pool = test_pool().await;
    let embedder = embedder.map(|e| e as Arc<dyn EmbeddingProvider>);
    let client = build_healing_client_with(&config, pool.clone(), judge, embedder, vcs)
        .await
        .unwrap();
    (client, pool)
}

/// A SAFE comment-only diff pattern for `event`.
pub fn seeded_safe_pattern(event: &ErrorEvent) -> Pattern {
    Pattern::new(
        event.fingerprint.clone(),
        FixAction::diff(
            "--- a/src/app.py\n+++ b/src/app.py\n+# clarify retry behavior\n",
            vec!["src/app.py".to_string()],
        ),
        SafetyCategory::Safe,
    )
}

pub fn import_error_event() -> ErrorEvent {
    ErrorEvent::new(
        "py:ModuleNotFoundError",
        "No module named 'foo'",
        None,
        vec!["src/app.py:10:main".to_string()],
        "test",
    )
}
