//! Infrastructure: configuration and process-level plumbing.

pub mod config;
pub mod setup;
