//! Backup Guardian - Main entry point
//!
//! Polls local and cloud backup sources and serves the aggregated view.

use anyhow::{bail, Context, Result};
use backup_guardian::api::{self, AppState};
use backup_guardian::daemon::ShutdownCoordinator;
use backup_guardian::poller::PollerState;
use backup_guardian::{utils, Config, Guardian};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single refresh, print the view as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides();

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, config.log.with_target)?;

    tracing::info!("Starting backup-guardian v{}", env!("CARGO_PKG_VERSION"));

    let guardian = Arc::new(Guardian::setup(&config)?);

    if args.once {
        return run_once(&guardian).await;
    }

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let app = api::create_router(AppState::new(guardian.clone()));

    tracing::info!("Listening on http://{}", bind);
    tracing::info!("Backups endpoint: http://{}/api/backups", bind);
    tracing::info!("WebSocket endpoint: ws://{}/ws", bind);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    let shutdown = ShutdownCoordinator::new();
    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.triggered().await })
                .await
        })
    };

    shutdown.wait_for_signal().await;
    guardian.teardown().await;

    match tokio::time::timeout(Duration::from_secs(5), server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Server shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!("Server error during shutdown: {}", e),
        Ok(Err(e)) => tracing::error!("Server task panicked: {}", e),
        Err(_) => tracing::warn!("Server shutdown timeout, forcing exit"),
    }

    Ok(())
}

/// Wait for the initial cycle started by setup and print its result.
async fn run_once(guardian: &Guardian) -> Result<()> {
    let mut states = guardian.poller().watch_state();
    let finished = states
        .wait_for(|s| matches!(s, PollerState::Published | PollerState::Failed { .. }))
        .await?
        .clone();
    guardian.teardown().await;

    if let PollerState::Failed { error } = finished {
        bail!("refresh failed: {error}");
    }
    let view = guardian
        .latest_view()
        .context("refresh finished without a view")?;
    println!("{}", serde_json::to_string_pretty(view.as_ref())?);
    Ok(())
}
