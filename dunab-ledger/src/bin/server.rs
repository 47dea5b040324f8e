//! DUNAB ledger server binary
//!
//! Opens the ledger, runs the notification dispatcher and waits for Ctrl-C.

use anyhow::Context;
use dunab_ledger::{Config, Ledger, LogSink, NotificationDispatcher};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("DUNAB ledger starting...");

    // Load configuration
    let config = match std::env::var("DUNAB_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        Err(_) => Config::from_env().context("failed to load config from environment")?,
    };

    info!(
        "Configuration loaded - data dir: {:?}, opening balance: {}",
        config.data_dir, config.ledger.opening_balance
    );

    let notifications = config.notifications.clone();
    let ledger = Ledger::open(config).await?;

    let dispatcher = if notifications.enabled {
        let dispatcher =
            NotificationDispatcher::new(ledger.queue().clone(), Arc::new(LogSink), &notifications);
        Some(dispatcher.spawn())
    } else {
        None
    };

    info!("DUNAB ledger initialized successfully");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutdown signal received");

    ledger.shutdown().await?;
    if let Some(dispatcher) = dispatcher {
        let delivered = dispatcher.shutdown().await?;
        info!(delivered, "Notifications delivered this session");
    }

    Ok(())
}
