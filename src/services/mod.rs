//! Business logic services for the mender remediation engine.

pub mod applicator;
pub mod breaker;
pub mod cascade;
pub mod client;
pub mod context;
pub mod cost;
pub mod judge;
pub mod lookup;
pub mod pipeline;
pub mod safety;

pub use applicator::{build_pr_body, FixApplicator};
pub use breaker::{CircuitBreaker, FixAllowance};
pub use cascade::CascadeDetector;
pub use client::{HealingClient, StatusReport};
pub use context::{ContextRetriever, FixContext};
pub use cost::CostTracker;
pub use judge::{Consensus, MultiModelJudge};
pub use lookup::{cosine_similarity, PatternStore};
pub use pipeline::ValidationPipeline;
pub use safety::SafetyCategorizer;
