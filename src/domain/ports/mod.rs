//! Ports (trait boundaries) between the domain and the adapters.

pub mod attempt_repository;
pub mod checks;
pub mod embedding;
pub mod judge_client;
pub mod pattern_repository;
pub mod state_repository;
pub mod vcs;

pub use attempt_repository::{AttemptRepository, OutcomeCount};
pub use checks::{CheckOutcome, CheckRunner};
pub use embedding::EmbeddingProvider;
pub use judge_client::JudgeClient;
pub use pattern_repository::PatternRepository;
pub use state_repository::StateRepository;
pub use vcs::{CommandOutput, VcsProvider};
