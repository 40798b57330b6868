//! Domain models for the mender remediation engine.

pub mod attempt;
pub mod breaker;
pub mod budget;
pub mod config;
pub mod error_event;
pub mod pattern;
pub mod safety;

pub use attempt::{
    AttemptOutcome, FixAttempt, JudgeVote, PipelineStage, RollbackInfo, StageReport, Vote,
};
pub use breaker::{BreakerStatus, CircuitBreakerState};
pub use budget::Budget;
pub use config::{
    BreakerConfig, BudgetConfig, CascadeConfig, CheckConfig, Config, ContextConfig,
    DatabaseConfig, EmbeddingConfig, Environment, JudgeModelConfig, JudgesConfig, LoggingConfig,
    LookupConfig, PipelineConfig, RemoteConfig, RetryConfig, SafetyConfig,
};
pub use error_event::{compute_fingerprint, normalize_message, ErrorEvent};
pub use pattern::{
    ActionType, CausalityEdge, FileEdit, FixAction, LookupResult, MatchTier, Pattern,
    PatternMatch,
};
pub use safety::SafetyCategory;
