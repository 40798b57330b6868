//! `mender export`: structured dump of stored patterns.

use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};

use super::CliContext;

#[derive(Args)]
pub struct ExportArgs {
    /// Include quarantined patterns in table output (JSON always does)
    #[arg(long)]
    pub all: bool,
}

pub async fn execute(args: ExportArgs, json: bool) -> Result<()> {
    let ctx = CliContext::load().await?;
    let patterns = ctx.pattern_store().export().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Fingerprint",
        "Safety",
        "Action",
        "Occurrences",
        "Successes",
        "Failures",
        "Quarantined",
    ]);
    for p in patterns
        .iter()
        .filter(|p| args.all || !p.quarantined)
    {
        table.add_row(vec![
            p.fingerprint.clone(),
            p.safety.as_str().to_string(),
            p.fix.action_type.as_str().to_string(),
            p.occurrence_count.to_string(),
            p.success_count.to_string(),
            p.failure_count.to_string(),
            p.quarantined.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
