//! TeleCloud daemon.
//!
//! Reads configuration from the environment, starts one long-poll loop per
//! bot, and drains background jobs on Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use core_runtime::config::CoreConfig;
use core_runtime::logging::init_logging;
use core_service::bootstrap;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = CoreConfig::from_env().context("Failed to load configuration")?;
    init_logging(config.logging.clone()).context("Failed to initialize logging")?;

    info!(
        bots = config.bot_tokens.len(),
        channels = config.storage_channels.len(),
        scan_root = %config.scan_root.display(),
        snapshot = %config.snapshot_path.display(),
        "Starting TeleCloud"
    );

    let grace = config.shutdown_grace;
    let service = bootstrap(config).context("Failed to build service")?;
    service.start().await.context("Failed to start service")?;

    core_async::signal::shutdown_signal().await;

    info!(grace_secs = grace.as_secs(), "Shutting down");
    let report = service.shutdown(grace).await;
    if !report.drained {
        warn!("Background jobs were still running at the deadline");
    }
    if report.saved_records.is_none() {
        anyhow::bail!("Final metadata save failed");
    }

    info!("TeleCloud stopped");
    Ok(())
}
