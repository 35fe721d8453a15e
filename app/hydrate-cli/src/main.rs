//! Hydrate CLI - download and mutate Windows container images.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on the debug flag.
    let filter = if cli.debug {
        "hydrate=debug,hydrate_image=debug"
    } else {
        "hydrate=info,hydrate_image=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Download(args) => commands::download::execute(args).await,
        Commands::AddLayer(args) => commands::add_layer::execute(&args),
        Commands::RemoveLayer(args) => commands::remove_layer::execute(&args),
    }
}
