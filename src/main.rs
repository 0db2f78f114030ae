mod bot;
mod config;
mod max;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{token_env, token_from, Config, MaxConfig};
use crate::max::types::BotInfo;
use crate::max::{MaxClient, PollOptions, UpdateStream};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,max_greeter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Validate the token, build the client and check it against `GET /me`.
/// Nothing is polled before this succeeds.
async fn bootstrap(token: Option<String>, config: &MaxConfig) -> Result<(MaxClient, BotInfo)> {
    let token = token_from(token)?;
    let client =
        MaxClient::new(token, &config.base_url).context("Failed to create API client")?;
    let me = client
        .authenticate()
        .await
        .context("Failed to get bot info")?;
    Ok((client, me))
}

async fn run() -> Result<()> {
    // Load configuration
    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let config_path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load_or_default(&config_path, explicit.is_some())?;
    info!("  API: {}", config.max.base_url);
    info!(
        "  Polling: limit {}, timeout {}s",
        config.max.poll_limit, config.max.poll_timeout_secs
    );

    let (client, me) = bootstrap(token_env(), &config.max).await?;
    info!("Bot: {}", me.display_name());
    let client = Arc::new(client);

    let cancel = CancellationToken::new();
    let watcher = shutdown::spawn_watcher(cancel.clone());

    info!("Bot is running and listening for updates...");
    let updates = UpdateStream::new(
        Arc::clone(&client),
        PollOptions::from(&config.max),
        cancel.clone(),
    )
    .into_stream();
    bot::run(client.as_ref(), &config.reply, updates, cancel).await;

    watcher.abort();
    info!("Bot stopped");
    Ok(())
}
