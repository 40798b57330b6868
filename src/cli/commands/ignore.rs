//! `mender ignore` / `mender unquarantine`: pattern quarantine control.

use anyhow::{Context, Result};
use clap::Args;

use super::CliContext;

#[derive(Args)]
pub struct IgnoreArgs {
    /// Error fingerprint to quarantine
    pub fingerprint: String,

    /// Why this pattern should stop auto-applying
    #[arg(long)]
    pub reason: String,
}

pub async fn execute(args: IgnoreArgs, json: bool) -> Result<()> {
    let ctx = CliContext::load().await?;
    ctx.pattern_store()
        .quarantine(&args.fingerprint, &args.reason)
        .await
        .context("failed to quarantine pattern")?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "quarantined": args.fingerprint, "reason": args.reason })
        );
    } else {
        println!("Quarantined {} ({})", args.fingerprint, args.reason);
    }
    Ok(())
}

#[derive(Args)]
pub struct UnquarantineArgs {
    /// Error fingerprint to reinstate
    pub fingerprint: String,
}

pub async fn execute_unquarantine(args: UnquarantineArgs, json: bool) -> Result<()> {
    let ctx = CliContext::load().await?;
    ctx.pattern_store()
        .unquarantine(&args.fingerprint)
        .await
        .context("failed to unquarantine pattern")?;

    if json {
        println!("{}", serde_json::json!({ "unquarantined": args.fingerprint }));
    } else {
        println!("Reinstated {}", args.fingerprint);
    }
    Ok(())
}
