mod commands;
mod config;
mod dispatch;
mod fault;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::CommandRouter;
use crate::config::Config;
use crate::dispatch::DispatchPipeline;
use crate::platform::telegram::TelegramPlatform;
use crate::platform::UpdateSource;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dontcrossme=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // One client serves both directions for the whole process lifetime
    let platform = Arc::new(TelegramPlatform::new(&config.telegram.bot_token));

    let bot_name = platform.identity().await?;

    let router = CommandRouter::new();
    info!("Commands: {:?}", router.keywords());
    let pipeline = Arc::new(DispatchPipeline::new(router, platform.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let span = info_span!("bot", name = %bot_name);
    async {
        info!("Start listening for @{}", bot_name);
        platform.start_receiving(pipeline, shutdown_rx).await
    }
    .instrument(span)
    .await?;

    Ok(())
}
