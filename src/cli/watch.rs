use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::ui::TerminalDisplay;
use crate::core::config::AppConfig;
use crate::core::display::Display;
use crate::providers::ProviderChain;
use crate::scheduler::{CycleOutcome, UpdateScheduler};

fn build_scheduler(config: &AppConfig) -> Result<UpdateScheduler> {
    let chain = ProviderChain::from_config(config).context("Failed to set up rate providers")?;
    Ok(UpdateScheduler::new(
        chain,
        Arc::new(TerminalDisplay),
        config.intervals(),
    ))
}

/// Keeps the rate updated on the terminal until interrupted.
pub async fn watch(config: &AppConfig) -> Result<()> {
    let scheduler = build_scheduler(config)?;
    scheduler.start();

    let result = wait_for_shutdown(&scheduler).await;
    scheduler.stop();
    result
}

#[cfg(unix)]
async fn wait_for_shutdown(scheduler: &UpdateScheduler) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup =
        signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, shutting down");
                return Ok(());
            }
            _ = hangup.recv() => scheduler.reconfigure(),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_scheduler: &UpdateScheduler) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, shutting down");
    Ok(())
}

/// Runs a single update cycle and prints its text.
pub async fn fetch_once(config: &AppConfig) -> Result<CycleOutcome> {
    let scheduler = build_scheduler(config)?;
    let outcome = scheduler.run_cycle().await;
    TerminalDisplay.set_text(&outcome.display_text());
    Ok(outcome)
}
