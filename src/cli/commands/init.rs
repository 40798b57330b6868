//! `mender init`: create the project config and database.

use anyhow::Result;
use clap::Args;

use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::setup;

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: InitArgs, json: bool) -> Result<()> {
    let paths = setup::SetupPaths::new()?;
    let already = paths.is_initialized();

    setup::create_config_dir(&paths)?;
    setup::create_config_file(&paths, args.force)?;

    let config = ConfigLoader::load()?;
    let pool = setup::open_database(&config).await?;
    drop(pool);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "config": paths.config_file.display().to_string(),
                "database": config.database.path,
                "already_initialized": already && !args.force,
            })
        );
    } else if already && !args.force {
        println!(
            "Already initialized ({}); database schema is up to date.",
            paths.config_file.display()
        );
    } else {
        println!("Initialized mender in {}", paths.config_dir.display());
        println!("  config:   {}", paths.config_file.display());
        println!("  database: {}", config.database.path);
    }
    Ok(())
}
