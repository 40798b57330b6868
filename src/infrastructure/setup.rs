//! Project initialization and service graph assembly.
//!
//! `init` creates the `.mender/` directory, a commented default config, and
//! the database schema. `build_healing_client` wires the full service graph
//! from a loaded config; it is the only place adapters are chosen, so
//! business logic never branches on the environment.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::checks::CommandCheckRunner;
use crate::adapters::embeddings::OpenAiEmbeddingProvider;
use crate::adapters::judges::{AnthropicJudgeClient, AnthropicJudgeConfig};
use crate::adapters::sqlite::{
    initialize_database, SqliteAttemptRepository, SqlitePatternRepository, SqliteStateRepository,
};
use crate::adapters::vcs::{LocalGitVcs, RemoteApiVcs};
use crate::domain::errors::HealResult;
use crate::domain::models::{Config, Environment};
use crate::domain::ports::{EmbeddingProvider, JudgeClient, VcsProvider};
use crate::services::{
    CascadeDetector, CircuitBreaker, ContextRetriever, CostTracker, FixApplicator, HealingClient,
    MultiModelJudge, PatternStore, SafetyCategorizer, ValidationPipeline,
};

/// Default configuration template content.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Mender Configuration
# Override settings by editing this file or setting environment variables
# with MENDER_ prefix
#
# Example environment variables:
#   export MENDER_PROJECT_ID=myproject
#   export MENDER_BUDGET__DAILY_LIMIT_USD=25.0
#   export MENDER_DATABASE__PATH=/custom/path/mender.db
#   export MENDER_LOGGING__LEVEL=debug

# Where fixes land: local (direct merge allowed for safe fixes) or hosted
# (every fix goes through a pull request)
environment: local

project_id: default

# Global kill switch; MENDER_DISABLE has the same effect
kill_switch: false

database:
  path: ".mender/mender.db"
  max_connections: 10

logging:
  level: "info"
  format: "pretty"
  directory: ".mender/logs"

budget:
  daily_limit_usd: 10.0
  max_validations_per_day: 50

breaker:
  revert_window_secs: 3600
  revert_threshold: 2
  cooldown_secs: 3600

cascade:
  modification_window_secs: 3600
  hot_file_threshold: 3
  recent_fix_window_secs: 600

# Tier-2 semantic lookup; disabled unless an embedding provider is set up
embedding:
  enabled: false
  similarity_threshold: 0.7

pipeline:
  max_files: 2
  max_changed_lines: 30
  verification_timeout_secs: 300
  approval_timeout_secs: 120
"#;

/// Paths used by project initialization.
pub struct SetupPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

impl SetupPaths {
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to resolve working directory")?;
        let config_dir = cwd.join(".mender");
        let config_file = config_dir.join("config.yaml");
        Ok(Self {
            config_dir,
            config_file,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

pub fn create_config_dir(paths: &SetupPaths) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).context("failed to create .mender directory")?;
    Ok(())
}

pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<()> {
    if paths.config_file.exists() && !force {
        return Ok(());
    }
    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE)
        .context("failed to write default config")?;
    Ok(())
}

/// Open the configured database and bring the schema up to date.
pub async fn open_database(config: &Config) -> Result<SqlitePool> {
    let url = format!("sqlite:{}", config.database.path);
    initialize_database(&url)
        .await
        .context("failed to initialize database")
}

pub fn build_vcs(config: &Config) -> HealResult<Arc<dyn VcsProvider>> {
    Ok(match config.environment {
        Environment::Local => Arc::new(LocalGitVcs::new(".")),
        Environment::Hosted => Arc::new(RemoteApiVcs::new(".", config.remote.clone(), None)?),
    })
}

pub fn build_embedder(config: &Config) -> HealResult<Option<Arc<dyn EmbeddingProvider>>> {
    if !config.embedding.enabled {
        return Ok(None);
    }
    let provider = OpenAiEmbeddingProvider::new(config.embedding.clone(), None)?;
    Ok(Some(Arc::new(provider)))
}

fn build_judge_client(config: &Config) -> HealResult<Arc<dyn JudgeClient>> {
    let judge_config = AnthropicJudgeConfig {
        max_tokens: config.judges.max_tokens,
        ..AnthropicJudgeConfig::default()
    };
    Ok(Arc::new(AnthropicJudgeClient::new(
        judge_config,
        &config.retry,
    )?))
}

/// Wire the full healing service graph. Configuration problems (missing
/// credentials, bad budget) are the only fatal startup errors.
pub async fn build_healing_client(config: &Config) -> Result<HealingClient> {
    let pool = open_database(config).await?;
    Ok(build_healing_client_with(
        config,
        pool,
        build_judge_client(config)?,
        build_embedder(config)?,
        build_vcs(config)?,
    )
    .await?)
}

/// Assembly with injectable providers, shared by tests and the default
/// builder.
pub async fn build_healing_client_with(
    config: &Config,
    pool: SqlitePool,
    judge_client: Arc<dyn JudgeClient>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vcs: Arc<dyn VcsProvider>,
) -> HealResult<HealingClient> {
    let pattern_repo = Arc::new(SqlitePatternRepository::new(pool.clone()));
    let attempt_repo = Arc::new(SqliteAttemptRepository::new(pool.clone()));
    let state_repo = Arc::new(SqliteStateRepository::new(pool));

    let store = Arc::new(PatternStore::new(
        pattern_repo,
        embedder,
        config.lookup.clone(),
        &config.embedding,
    ));
    store.warm_cache().await?;

    let breaker = Arc::new(CircuitBreaker::new(
        state_repo.clone(),
        config.breaker.clone(),
        config.project_id.clone(),
    ));
    let cascade = Arc::new(CascadeDetector::new(config.cascade.clone()));
    let cost = Arc::new(CostTracker::new(state_repo, config.budget.clone()));
    let judge = Arc::new(MultiModelJudge::new(judge_client, config.judges.clone()));
    let context = Arc::new(ContextRetriever::new(config.context.clone(), "."));
    let checks = Arc::new(CommandCheckRunner::new("."));

    let post_apply_check = config
        .pipeline
        .checks
        .iter()
        .find(|c| c.name == config.pipeline.post_apply_check)
        .cloned();

    let pipeline = Arc::new(ValidationPipeline::new(
        breaker.clone(),
        cascade.clone(),
        cost.clone(),
        SafetyCategorizer::new(config.safety.clone()),
        store.clone(),
        judge,
        context,
        checks.clone(),
        config.pipeline.clone(),
        config.environment,
        config.kill_switch,
    ));

    let applicator = Arc::new(FixApplicator::new(
        vcs,
        checks,
        store.clone(),
        cascade,
        breaker.clone(),
        post_apply_check,
        config.safety.quarantine_after_failures,
    ));

    let attempts: Arc<dyn crate::domain::ports::AttemptRepository> = attempt_repo;
    Ok(HealingClient::new(
        store, pipeline, applicator, attempts, breaker, cost,
    ))
}
