//! Mender - Automated Error Remediation Engine
//!
//! Mender observes runtime/build/test failures, matches them against a
//! multi-tier pattern store, classifies candidate fixes by risk, validates
//! them through a staged pipeline (preflight checks, concurrent
//! build/lint/test verification, multi-model consensus approval), and
//! applies them through environment-aware version-control adapters: direct
//! merge locally for low-risk fixes, a pull request everywhere else.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, ports, and the error taxonomy
//! - **Service Layer** (`services`): matching, classification, validation,
//!   and application logic
//! - **Adapters** (`adapters`): SQLite persistence, embedding and judge
//!   providers, version-control and check runners
//! - **Infrastructure** (`infrastructure`): configuration and assembly
//! - **CLI Layer** (`cli`): operator commands
//!
//! # Example
//!
//! ```ignore
//! use mender::infrastructure::config::ConfigLoader;
//! use mender::infrastructure::setup::build_healing_client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let client = build_healing_client(&config).await?;
//!     // feed ErrorEvents from workflow hooks into client.handle(...)
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{HealError, HealResult};
pub use domain::models::{
    AttemptOutcome, BreakerStatus, Budget, CausalityEdge, CircuitBreakerState, Config,
    Environment, ErrorEvent, FixAction, FixAttempt, JudgeVote, LookupResult, Pattern,
    PatternMatch, PipelineStage, SafetyCategory, Vote,
};
pub use domain::ports::{
    AttemptRepository, CheckRunner, EmbeddingProvider, JudgeClient, PatternRepository,
    StateRepository, VcsProvider,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CascadeDetector, CircuitBreaker, CostTracker, FixApplicator, HealingClient, MultiModelJudge,
    PatternStore, SafetyCategorizer, ValidationPipeline,
};
