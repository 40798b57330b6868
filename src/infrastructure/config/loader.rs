//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration validation errors. Fatal at startup only.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid daily budget: {0}. Must be positive")]
    InvalidBudget(f64),

    #[error("Invalid max_validations_per_day: {0}. Must be at least 1")]
    InvalidValidationCeiling(u32),

    #[error("Invalid revert_threshold: {0}. Must be at least 1")]
    InvalidRevertThreshold(usize),

    #[error("Invalid similarity threshold: {0}. Must be within 0.0..=1.0")]
    InvalidSimilarityThreshold(f32),

    #[error("Invalid consensus threshold: {0}. Must be within 0.0..1.0")]
    InvalidConsensusThreshold(f64),

    #[error("No judge models configured")]
    NoJudgeModels,

    #[error("Invalid pipeline constraint: {0}")]
    InvalidPipelineConstraint(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.mender/config.yaml` (project config)
    /// 3. `.mender/local.yaml` (local overrides, optional)
    /// 4. Environment variables (`MENDER_*` prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".mender/config.yaml"))
            .merge(Yaml::file(".mender/local.yaml"))
            .merge(Env::prefixed("MENDER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.budget.daily_limit_usd <= 0.0 {
            return Err(ConfigError::InvalidBudget(config.budget.daily_limit_usd));
        }
        if config.budget.max_validations_per_day == 0 {
            return Err(ConfigError::InvalidValidationCeiling(
                config.budget.max_validations_per_day,
            ));
        }
        if config.breaker.revert_threshold == 0 {
            return Err(ConfigError::InvalidRevertThreshold(
                config.breaker.revert_threshold,
            ));
        }
        if !(0.0..=1.0).contains(&config.embedding.similarity_threshold) {
            return Err(ConfigError::InvalidSimilarityThreshold(
                config.embedding.similarity_threshold,
            ));
        }
        if !(0.0..1.0).contains(&config.judges.consensus_threshold) {
            return Err(ConfigError::InvalidConsensusThreshold(
                config.judges.consensus_threshold,
            ));
        }
        if config.judges.models.is_empty() {
            return Err(ConfigError::NoJudgeModels);
        }
        if config.pipeline.max_files == 0 || config.pipeline.max_changed_lines == 0 {
            return Err(ConfigError::InvalidPipelineConstraint(
                "max_files and max_changed_lines must be at least 1".to_string(),
            ));
        }
        if !matches!(
            config.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        Ok(())
    }
}
