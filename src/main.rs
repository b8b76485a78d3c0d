mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use cli::{Cli, Commands};
use stock_feed::app::{self, WatchOptions};
use stock_feed::config::FeedConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, origin) =
        FeedConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log.level.as_str()),
    )
    .init();
    info!("using config from {origin}");

    run(cli.command, config).await
}

async fn run(command: Commands, config: FeedConfig) -> Result<()> {
    let (fetcher, mut events) = app::http_fetcher(&config)?;

    match command {
        Commands::Watch {
            code,
            interval_ms,
            mode,
            ticks,
        } => {
            let options = WatchOptions {
                code,
                interval: interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.polling.interval()),
                mode: mode.into(),
                max_quotes: ticks,
            };
            app::watch(&config, &fetcher, &mut events, &options)
                .await
                .context("watch failed")?;
        }
        Commands::History { code, start, end } => {
            app::history(&config, &fetcher, &mut events, &code, start, end)
                .await
                .context("history request failed")?;
        }
    }

    Ok(())
}
