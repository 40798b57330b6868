//! `mender status`: breaker state, budget, and today's outcomes.

use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::ports::AttemptRepository;

use super::CliContext;

#[derive(Args)]
pub struct StatusArgs {}

pub async fn execute(_args: StatusArgs, json: bool) -> Result<()> {
    let ctx = CliContext::load().await?;

    let breaker = ctx.breaker().current_state().await?;
    let budget = ctx.cost_tracker().snapshot().await?;
    let pattern_count = ctx.pattern_store().count().await?;
    let outcomes = ctx.attempts().outcome_counts_today().await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "breaker": {
                    "status": breaker.status.as_str(),
                    "recent_reverts": breaker.recent_reverts.len(),
                    "opened_at": breaker.opened_at.map(|t| t.to_rfc3339()),
                },
                "budget": {
                    "spent_usd": budget.spent_usd,
                    "limit_usd": budget.limit_usd,
                    "validations_today": budget.validations_today,
                    "max_validations_per_day": budget.max_validations_per_day,
                },
                "patterns": pattern_count,
                "outcomes_today": outcomes
                    .iter()
                    .map(|o| serde_json::json!({"outcome": o.outcome, "count": o.count}))
                    .collect::<Vec<_>>(),
            })
        );
        return Ok(());
    }

    println!(
        "Circuit breaker: {} ({} recent reverts)",
        breaker.status.as_str(),
        breaker.recent_reverts.len()
    );
    println!(
        "Budget: ${:.2} / ${:.2} spent, {} / {} validations",
        budget.spent_usd, budget.limit_usd, budget.validations_today, budget.max_validations_per_day
    );
    println!("Stored patterns: {pattern_count}");

    if outcomes.is_empty() {
        println!("No fix attempts today.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Outcome", "Count"]);
    for outcome in &outcomes {
        table.add_row(vec![outcome.outcome.clone(), outcome.count.to_string()]);
    }
    println!("{table}");
    Ok(())
}
