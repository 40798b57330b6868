//! `mender apply`: re-apply a recorded fix attempt by id.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::adapters::checks::CommandCheckRunner;
use crate::infrastructure::setup;
use crate::services::applicator::{reapply_recorded, FixApplicator};
use crate::services::CascadeDetector;

use super::CliContext;

#[derive(Args)]
pub struct ApplyArgs {
    /// Fix attempt id from the audit log
    pub id: Uuid,

    /// Show what would be applied without touching the tree
    #[arg(long)]
    pub dry_run: bool,

    /// Apply even if the pipeline did not approve (explicit human override)
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: ApplyArgs, json: bool) -> Result<()> {
    let ctx = CliContext::load().await?;

    let store = ctx.pattern_store();
    let cascade = Arc::new(CascadeDetector::new(ctx.config.cascade.clone()));
    let breaker = Arc::new(ctx.breaker());
    let checks = Arc::new(CommandCheckRunner::new("."));
    let vcs = setup::build_vcs(&ctx.config)?;
    let post_apply_check = ctx
        .config
        .pipeline
        .checks
        .iter()
        .find(|c| c.name == ctx.config.pipeline.post_apply_check)
        .cloned();

    let applicator = FixApplicator::new(
        vcs,
        checks,
        store,
        cascade,
        breaker,
        post_apply_check,
        ctx.config.safety.quarantine_after_failures,
    );

    let attempts = ctx.attempts();
    let attempt = reapply_recorded(&applicator, attempts.as_ref(), args.id, args.dry_run, args.force)
        .await
        .context("apply failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&attempt)?);
    } else if args.dry_run {
        println!("Would apply attempt {}:", attempt.id);
        println!("{}", attempt.explain());
    } else {
        println!("Applied attempt {} -> {}", attempt.id, attempt.outcome.kind());
        println!("{}", attempt.explain());
    }
    Ok(())
}
