//! ClipStash - clipboard history manager for Linux
//!
//! This is the main entry point for both the capture daemon and the
//! front-end commands.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipstash::cli::{Cli, CliHandler};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("clipstash={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("ClipStash v{}", env!("CARGO_PKG_VERSION"));

    let mut handler = CliHandler::new(cli.config)?;
    handler.handle_command(cli.command).await?;

    Ok(())
}
