//! CLI command implementations.

pub mod apply;
pub mod backfill;
pub mod explain;
pub mod export;
pub mod ignore;
pub mod init;
pub mod status;

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{
    SqliteAttemptRepository, SqlitePatternRepository, SqliteStateRepository,
};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::setup;
use crate::services::{CircuitBreaker, CostTracker, PatternStore};

/// Shared per-command context: loaded config plus the open database.
/// Commands build only the services they need from it.
pub(crate) struct CliContext {
    pub config: Config,
    pub pool: SqlitePool,
}

impl CliContext {
    pub async fn load() -> Result<Self> {
        let config = ConfigLoader::load()?;
        let pool = setup::open_database(&config).await?;
        Ok(Self { config, pool })
    }

    /// Pattern store without a Tier-2 provider; maintenance commands never
    /// need embeddings. Backfill builds its own store with one.
    pub fn pattern_store(&self) -> Arc<PatternStore> {
        let repo = Arc::new(SqlitePatternRepository::new(self.pool.clone()));
        Arc::new(PatternStore::new(
            repo,
            None,
            self.config.lookup.clone(),
            &self.config.embedding,
        ))
    }

    /// Pattern store with the configured embedding provider (if enabled).
    pub fn pattern_store_with_embedder(&self) -> Result<Arc<PatternStore>> {
        let repo = Arc::new(SqlitePatternRepository::new(self.pool.clone()));
        let embedder = setup::build_embedder(&self.config)?;
        Ok(Arc::new(PatternStore::new(
            repo,
            embedder,
            self.config.lookup.clone(),
            &self.config.embedding,
        )))
    }

    pub fn attempts(&self) -> Arc<SqliteAttemptRepository> {
        Arc::new(SqliteAttemptRepository::new(self.pool.clone()))
    }

    pub fn state(&self) -> Arc<SqliteStateRepository> {
        Arc::new(SqliteStateRepository::new(self.pool.clone()))
    }

    pub fn breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            self.state(),
            self.config.breaker.clone(),
            self.config.project_id.clone(),
        )
    }

    pub fn cost_tracker(&self) -> CostTracker {
        CostTracker::new(self.state(), self.config.budget.clone())
    }
}
