//! `mender explain`: stored pattern and recent attempts for a fingerprint.

use anyhow::Result;
use clap::Args;

use crate::domain::ports::AttemptRepository;

use super::CliContext;

#[derive(Args)]
pub struct ExplainArgs {
    /// Error fingerprint to explain
    pub fingerprint: String,
}

pub async fn execute(args: ExplainArgs, json: bool) -> Result<()> {
    let ctx = CliContext::load().await?;
    let store = ctx.pattern_store();

    let pattern = store.get(&args.fingerprint).await?;
    let attempts = ctx.attempts().by_fingerprint(&args.fingerprint).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "fingerprint": args.fingerprint,
                "pattern": pattern,
                "attempts": attempts,
            })
        );
        return Ok(());
    }

    match &pattern {
        Some(p) => {
            println!(
                "pattern {} [{}] occurrences={} successes={} failures={}",
                p.fingerprint,
                p.safety.as_str(),
                p.occurrence_count,
                p.success_count,
                p.failure_count
            );
            if p.quarantined {
                println!(
                    "  quarantined{}",
                    p.quarantine_reason
                        .as_deref()
                        .map(|r| format!(": {r}"))
                        .unwrap_or_default()
                );
            }
        }
        None => println!("No stored pattern for {}", args.fingerprint),
    }

    if attempts.is_empty() {
        println!("No recorded attempts.");
        return Ok(());
    }
    for attempt in attempts.iter().take(10) {
        println!("\n{}", attempt.explain());
    }
    Ok(())
}
