// ClassDesk - teacher's assistant for rosters, attendance and notes
// Entry point

use anyhow::Context;
use clap::Parser;
use classdesk::app::AppState;
use classdesk::cli::Cli;
use classdesk::commands;
use classdesk::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classdesk=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let state = AppState::initialize(&config)
        .await
        .context("Failed to initialize application")?;

    let output = commands::run(&state, cli.command).await?;
    println!("{}", output.trim_end());

    Ok(())
}
