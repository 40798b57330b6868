//! In-process caching adapters.

pub mod pattern_cache;

pub use pattern_cache::PatternCache;
