//! Configuration model for mender.
//!
//! Loaded hierarchically (defaults → `.mender/config.yaml` →
//! `.mender/local.yaml` → `MENDER_*` env) by the config loader.

use serde::{Deserialize, Serialize};

/// Where fixes are applied. Resolved once at construction into a concrete
/// version-control adapter; business logic never branches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Developer machine: direct merge allowed for SAFE fixes.
    Local,
    /// Hosted/CI: every applied fix goes through a pull request.
    Hosted,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Local
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Hosted => "hosted",
        }
    }
}

/// Main configuration structure for mender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    /// Project the breaker state and patterns are scoped to.
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Global kill switch: disables all auto-fix when set. The
    /// `MENDER_DISABLE` env var has the same effect.
    #[serde(default)]
    pub kill_switch: bool,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub cascade: CascadeConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub judges: JudgesConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_project_id() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            project_id: default_project_id(),
            kill_switch: false,
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            budget: BudgetConfig::default(),
            breaker: BreakerConfig::default(),
            cascade: CascadeConfig::default(),
            context: ContextConfig::default(),
            lookup: LookupConfig::default(),
            embedding: EmbeddingConfig::default(),
            judges: JudgesConfig::default(),
            pipeline: PipelineConfig::default(),
            safety: SafetyConfig::default(),
            remote: RemoteConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".mender/mender.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for daily-rolling log files; empty disables file logging.
    #[serde(default = "default_log_directory")]
    pub directory: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_directory() -> String {
    ".mender/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: default_log_directory(),
        }
    }
}

/// Daily spend budget and validation ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    #[serde(default = "default_daily_limit_usd")]
    pub daily_limit_usd: f64,

    #[serde(default = "default_max_validations_per_day")]
    pub max_validations_per_day: u32,

    /// Cost of one judge-equivalent call.
    #[serde(default = "default_judge_cost_usd")]
    pub judge_cost_usd: f64,

    /// Fixed cost added per lookup (embedding + store traffic).
    #[serde(default = "default_lookup_cost_usd")]
    pub lookup_cost_usd: f64,
}

const fn default_daily_limit_usd() -> f64 {
    10.0
}

const fn default_max_validations_per_day() -> u32 {
    50
}

const fn default_judge_cost_usd() -> f64 {
    0.05
}

const fn default_lookup_cost_usd() -> f64 {
    0.01
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit_usd: default_daily_limit_usd(),
            max_validations_per_day: default_max_validations_per_day(),
            judge_cost_usd: default_judge_cost_usd(),
            lookup_cost_usd: default_lookup_cost_usd(),
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BreakerConfig {
    /// Rolling window for counting reverts.
    #[serde(default = "default_breaker_window_secs")]
    pub revert_window_secs: u64,

    /// Reverts within the window that trip the breaker.
    #[serde(default = "default_revert_threshold")]
    pub revert_threshold: usize,

    /// Time OPEN before a single probe is admitted.
    #[serde(default = "default_breaker_cooldown_secs")]
    pub cooldown_secs: u64,
}

const fn default_breaker_window_secs() -> u64 {
    3600
}

const fn default_revert_threshold() -> usize {
    2
}

const fn default_breaker_cooldown_secs() -> u64 {
    3600
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            revert_window_secs: default_breaker_window_secs(),
            revert_threshold: default_revert_threshold(),
            cooldown_secs: default_breaker_cooldown_secs(),
        }
    }
}

/// Cascade detection windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CascadeConfig {
    /// Rolling window for per-file modification counts.
    #[serde(default = "default_modification_window_secs")]
    pub modification_window_secs: u64,

    /// Modifications within the window that make a file hot.
    #[serde(default = "default_hot_file_threshold")]
    pub hot_file_threshold: usize,

    /// A fix applied to the same file within this window signals a cascade.
    #[serde(default = "default_recent_fix_window_secs")]
    pub recent_fix_window_secs: u64,
}

const fn default_modification_window_secs() -> u64 {
    3600
}

const fn default_hot_file_threshold() -> usize {
    3
}

const fn default_recent_fix_window_secs() -> u64 {
    600
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            modification_window_secs: default_modification_window_secs(),
            hot_file_threshold: default_hot_file_threshold(),
            recent_fix_window_secs: default_recent_fix_window_secs(),
        }
    }
}

/// Bounds on context gathering for judge prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ContextConfig {
    /// Lines of code captured on each side of the error site.
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,

    /// Files larger than this are skipped entirely.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

const fn default_snippet_radius() -> usize {
    20
}

const fn default_max_file_bytes() -> u64 {
    512 * 1024
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            snippet_radius: default_snippet_radius(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Tiered lookup tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LookupConfig {
    /// TTL for Tier-1 cache entries.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Top-N frequent patterns loaded into the cache at startup.
    #[serde(default = "default_cache_warm_count")]
    pub cache_warm_count: usize,

    /// Maximum traversal depth for Tier-3 causality context.
    #[serde(default = "default_causality_depth")]
    pub causality_depth: u32,
}

const fn default_cache_ttl_secs() -> u64 {
    300
}

const fn default_cache_warm_count() -> usize {
    100
}

const fn default_causality_depth() -> u32 {
    3
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_warm_count: default_cache_warm_count(),
            causality_depth: default_causality_depth(),
        }
    }
}

/// Embedding provider configuration. Tier-2 lookup is skipped entirely when
/// disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum cosine similarity for a Tier-2 match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimension() -> usize {
    1536
}

const fn default_embedding_timeout_secs() -> u64 {
    30
}

const fn default_similarity_threshold() -> f32 {
    0.7
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout_secs(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// One judge model with its vote weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeModelConfig {
    pub model: String,

    #[serde(default = "default_judge_weight")]
    pub weight: f64,
}

const fn default_judge_weight() -> f64 {
    1.0
}

/// Multi-model judge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgesConfig {
    /// Models drawn from in tier order; the first N vote for an N-judge tier.
    #[serde(default = "default_judge_models")]
    pub models: Vec<JudgeModelConfig>,

    /// Weighted approval ratio a 2-3 judge panel must clear (exclusive).
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,

    /// Re-deliberation rounds granted to dissenting judges before the vote
    /// is final.
    #[serde(default = "default_deliberation_rounds")]
    pub deliberation_rounds: u32,

    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: usize,
}

fn default_judge_models() -> Vec<JudgeModelConfig> {
    vec![
        JudgeModelConfig {
            model: "claude-sonnet-4-20250514".to_string(),
            weight: 1.0,
        },
        JudgeModelConfig {
            model: "claude-3-5-haiku-20241022".to_string(),
            weight: 1.0,
        },
        JudgeModelConfig {
            model: "claude-opus-4-20250514".to_string(),
            weight: 1.5,
        },
    ]
}

const fn default_consensus_threshold() -> f64 {
    0.5
}

const fn default_deliberation_rounds() -> u32 {
    1
}

const fn default_judge_max_tokens() -> usize {
    1024
}

impl Default for JudgesConfig {
    fn default() -> Self {
        Self {
            models: default_judge_models(),
            consensus_threshold: default_consensus_threshold(),
            deliberation_rounds: default_deliberation_rounds(),
            max_tokens: default_judge_max_tokens(),
        }
    }
}

/// One verification check (build, lint, test).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckConfig {
    pub name: String,

    /// Shell command. `{targets}` expands to the affected files for
    /// narrowed post-apply verification.
    pub command: String,

    /// Required checks must pass for the stage to pass.
    #[serde(default = "default_check_required")]
    pub required: bool,
}

const fn default_check_required() -> bool {
    true
}

/// Validation pipeline constraints and stage timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Hard constraint: candidate fixes may touch at most this many files.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Hard constraint: candidate diffs may change at most this many lines.
    #[serde(default = "default_max_changed_lines")]
    pub max_changed_lines: usize,

    #[serde(default = "default_verification_timeout_secs")]
    pub verification_timeout_secs: u64,

    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: u64,

    #[serde(default = "default_checks")]
    pub checks: Vec<CheckConfig>,

    /// Name of the check re-run (narrowed to affected files) after apply.
    #[serde(default = "default_post_apply_check")]
    pub post_apply_check: String,
}

const fn default_max_files() -> usize {
    2
}

const fn default_max_changed_lines() -> usize {
    30
}

const fn default_verification_timeout_secs() -> u64 {
    300
}

const fn default_approval_timeout_secs() -> u64 {
    120
}

fn default_checks() -> Vec<CheckConfig> {
    vec![
        CheckConfig {
            name: "build".to_string(),
            command: "cargo check --quiet".to_string(),
            required: true,
        },
        CheckConfig {
            name: "lint".to_string(),
            command: "cargo clippy --quiet -- -D warnings".to_string(),
            required: true,
        },
        CheckConfig {
            name: "test".to_string(),
            command: "cargo test --quiet {targets}".to_string(),
            required: true,
        },
    ]
}

fn default_post_apply_check() -> String {
    "test".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_changed_lines: default_max_changed_lines(),
            verification_timeout_secs: default_verification_timeout_secs(),
            approval_timeout_secs: default_approval_timeout_secs(),
            checks: default_checks(),
            post_apply_check: default_post_apply_check(),
        }
    }
}

/// Safety categorizer pattern lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SafetyConfig {
    /// Path fragments that force RISKY regardless of diff content.
    #[serde(default = "default_protected_paths")]
    pub protected_paths: Vec<String>,

    /// Keywords in changed lines that force RISKY.
    #[serde(default = "default_sensitive_keywords")]
    pub sensitive_keywords: Vec<String>,

    /// Consecutive failures before a pattern is auto-quarantined.
    #[serde(default = "default_quarantine_after_failures")]
    pub quarantine_after_failures: u32,
}

fn default_protected_paths() -> Vec<String> {
    [
        "migrations/",
        ".env",
        "secrets",
        "credentials",
        ".github/workflows/",
        "Dockerfile",
        "deploy/",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_sensitive_keywords() -> Vec<String> {
    ["password", "passwd", "secret", "token", "api_key", "apikey", "auth"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_quarantine_after_failures() -> u32 {
    3
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            protected_paths: default_protected_paths(),
            sensitive_keywords: default_sensitive_keywords(),
            quarantine_after_failures: default_quarantine_after_failures(),
        }
    }
}

/// Hosted forge API used by the remote adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RemoteConfig {
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,

    /// `owner/repo` slug.
    #[serde(default)]
    pub repository: String,

    #[serde(default = "default_remote_branch")]
    pub default_branch: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_remote_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_remote_branch() -> String {
    "main".to_string()
}

const fn default_remote_timeout_secs() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            repository: String::new(),
            default_branch: default_remote_branch(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

/// Retry policy for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Judge/embedding requests per second.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

const fn default_requests_per_second() -> f64 {
    5.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            requests_per_second: default_requests_per_second(),
        }
    }
}
