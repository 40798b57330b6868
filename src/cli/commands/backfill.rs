//! `mender backfill`: replay a historical error log through the
//! lookup/record path.
//!
//! The log file carries one JSON `ErrorEvent` per line (the audit format
//! external detectors emit).

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::models::ErrorEvent;

use super::CliContext;

#[derive(Args)]
pub struct BackfillArgs {
    /// Path to a JSON-lines file of historical error events
    pub log_file: std::path::PathBuf,
}

pub async fn execute(args: BackfillArgs, json: bool) -> Result<()> {
    let ctx = CliContext::load().await?;
    let store = ctx.pattern_store_with_embedder()?;

    let contents = std::fs::read_to_string(&args.log_file)
        .with_context(|| format!("failed to read {}", args.log_file.display()))?;
    let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();

    let bar = if json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(lines.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .expect("valid progress template"),
        );
        bar
    };

    let mut matched = 0usize;
    let mut missed = 0usize;
    let mut malformed = 0usize;

    for line in lines {
        match serde_json::from_str::<ErrorEvent>(line) {
            Ok(event) => {
                if store.replay_event(&event).await? {
                    matched += 1;
                } else {
                    missed += 1;
                }
            }
            Err(_) => malformed += 1,
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "matched": matched,
                "missed": missed,
                "malformed": malformed,
            })
        );
    } else {
        println!("Backfill complete: {matched} matched, {missed} missed, {malformed} malformed");
    }
    Ok(())
}
