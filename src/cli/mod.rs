//! Operator-facing command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mender",
    about = "Automated error-remediation engine",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize .mender config and database in the current project
    Init(commands::init::InitArgs),
    /// Show breaker state, budget, and today's outcomes
    Status(commands::status::StatusArgs),
    /// Re-apply a recorded fix attempt by id
    Apply(commands::apply::ApplyArgs),
    /// Quarantine a pattern by fingerprint
    Ignore(commands::ignore::IgnoreArgs),
    /// Reinstate a quarantined pattern
    Unquarantine(commands::ignore::UnquarantineArgs),
    /// Explain the stored pattern and recent attempts for a fingerprint
    Explain(commands::explain::ExplainArgs),
    /// Dump every stored pattern as JSON
    Export(commands::export::ExportArgs),
    /// Replay a historical error log through the lookup/record path
    Backfill(commands::backfill::BackfillArgs),
}

/// Print a CLI error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        eprintln!(
            "{}",
            serde_json::json!({ "error": format!("{err:#}") })
        );
    } else {
        eprintln!("error: {err:#}");
    }
    std::process::exit(1);
}
