//! Mender CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mender::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // File logging is best-effort: a read-only tree should not stop the CLI.
    let file_layer = std::fs::create_dir_all(".mender/logs").ok().map(|()| {
        let appender = tracing_appender::rolling::daily(".mender/logs", "mender.log");
        tracing_subscriber::fmt::layer().with_ansi(false).with_writer(appender)
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    let result = match cli.command {
        Commands::Init(args) => mender::cli::commands::init::execute(args, cli.json).await,
        Commands::Status(args) => mender::cli::commands::status::execute(args, cli.json).await,
        Commands::Apply(args) => mender::cli::commands::apply::execute(args, cli.json).await,
        Commands::Ignore(args) => mender::cli::commands::ignore::execute(args, cli.json).await,
        Commands::Unquarantine(args) => {
            mender::cli::commands::ignore::execute_unquarantine(args, cli.json).await
        }
        Commands::Explain(args) => mender::cli::commands::explain::execute(args, cli.json).await,
        Commands::Export(args) => mender::cli::commands::export::execute(args, cli.json).await,
        Commands::Backfill(args) => mender::cli::commands::backfill::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        mender::cli::handle_error(err, cli.json);
    }
}
