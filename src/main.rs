//! Furnish CLI - Persistent AR Furniture Placement
//!
//! Command-line interface for the Furnish placement session tools.

use anyhow::Context;
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use furnish::cli::{commands, Cli, Commands};
use furnish::SessionConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Furnish v{}", env!("CARGO_PKG_VERSION"));

    let config = SessionConfig::load_or_default(cli.config.as_deref())
        .context("loading session configuration")?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &config).await,
        None => {
            println!("Furnish v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

async fn handle_command(cmd: Commands, config: &SessionConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Inspect { store } => commands::inspect(config, store.as_deref())?,
        Commands::Clear => commands::clear(config)?,
        Commands::Simulate { dir, placements } => commands::simulate(&dir, placements).await?,
    }
    Ok(())
}
