use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use usd_rub_indicator::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for usd_rub_indicator::AppCommand {
    fn from(cmd: Commands) -> usd_rub_indicator::AppCommand {
        match cmd {
            Commands::Watch => usd_rub_indicator::AppCommand::Watch,
            Commands::Fetch => usd_rub_indicator::AppCommand::Fetch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Keep the exchange rate updated until interrupted (SIGHUP refreshes now)
    Watch,
    /// Fetch the exchange rate once
    Fetch,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => usd_rub_indicator::cli::setup::setup(cli.config_path.as_deref()),
        Some(cmd) => usd_rub_indicator::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
