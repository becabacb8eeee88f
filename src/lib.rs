pub mod cli;
pub mod core;
pub mod providers;
pub mod scheduler;

use anyhow::Result;
use tracing::{debug, info};

use crate::core::config::AppConfig;
use crate::scheduler::CycleOutcome;

pub enum AppCommand {
    Watch,
    Fetch,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("USD/RUB indicator starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Watch => cli::watch::watch(&config).await,
        AppCommand::Fetch => match cli::watch::fetch_once(&config).await? {
            CycleOutcome::Success(reading) => {
                info!(provider = %reading.provider, rate = reading.rate, "Fetched rate");
                Ok(())
            }
            CycleOutcome::Failure(e) => Err(e.into()),
        },
    }
}
