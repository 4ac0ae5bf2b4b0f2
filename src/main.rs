//! autotube - unattended folder-watching video uploader
//!
//! Main entry point.
//!
//! # Execution Flow
//!
//! 1. Load `config.yaml` (+ `user_config.yaml`) from `AUTOTUBE_CONFIG_DIR` (default `.`)
//! 2. Initialize logging → `{logging.dir}/{logging.prefix}.<date>`
//! 3. Build the YouTube client from `YOUTUBE_ACCESS_TOKEN`
//! 4. Run the scan loop on a current-thread tokio runtime until Ctrl-C
//! 5. Log the metrics summary
//!
//! Files are processed strictly one at a time, so a single-threaded runtime
//! is all the pipeline needs.

use anyhow::{Context, Result};
use autotube::services::{TitlePolicy, YouTubeClient};
use autotube::{APP_NAME, ConfigManager, Metrics, Pipeline, VERSION};
use std::sync::Arc;
use tokio::sync::watch;

/// Environment variable naming the configuration directory
const CONFIG_DIR_ENV: &str = "AUTOTUBE_CONFIG_DIR";

fn main() -> Result<()> {
    let config_dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| ".".to_string());
    let config_manager = ConfigManager::new(&config_dir)?;
    let config = config_manager.load_config()?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = autotube::logging::setup_logging(&config.logging)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!(
        "Loaded configuration from {} ({} group rules)",
        config_manager.config_dir(),
        config.group_settings.len()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let metrics = Arc::new(Metrics::new());
    let result = runtime.block_on(run(config, metrics.clone()));

    metrics.log_summary();
    tracing::info!("Application shutdown complete");

    if let Err(e) = &result {
        tracing::error!("Fatal error: {:#}", e);
    }
    result
}

async fn run(config: autotube::AppConfig, metrics: Arc<Metrics>) -> Result<()> {
    let client = YouTubeClient::from_env(
        TitlePolicy::new(config.policy.title_max_chars),
        config.policy.upload_chunk_bytes,
    )
    .context("Failed to create YouTube client")?;

    let pipeline = Pipeline::new(config, Arc::new(client), metrics)
        .context("Invalid configuration")?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupt received, stopping after the current file"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                // Keep the sender alive; dropping it would stop the loop
                std::future::pending::<()>().await;
            }
        }
        // Receiver may already be gone if the loop ended on its own
        let _ = cancel_tx.send(true);
    });

    pipeline.run(cancel_rx).await;
    Ok(())
}
