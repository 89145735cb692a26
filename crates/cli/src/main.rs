use clap::{Parser, Subcommand};
use position_alert_cli::commands::{self, CheckArgs};
use position_alert_core::config_loader::DEFAULT_CONFIG_PATH;
use position_alert_core::MonitorError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, warn};

#[derive(Parser)]
#[command(name = "position-alert")]
#[command(about = "Email alerts when a Hyperliquid account's positions change", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH, env = "POSITION_ALERT_CONFIG")]
    config: PathBuf,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare current positions with the last run and alert on changes
    Check(CheckArgs),
    /// Print the persisted snapshot for the configured account
    ShowState,
    /// Delete the persisted snapshot so the next check starts fresh
    ResetState,
    /// Print the account's current positions
    Positions,
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_file = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_ref()) {
        eprintln!("Failed to open log file: {e}");
        return ExitCode::from(commands::check::EXIT_CONFIG_FAILURE);
    }

    match env_file {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    let result = match cli.command {
        Commands::Check(args) => return commands::run_check(&cli.config, args).await,
        Commands::ShowState => commands::run_show_state(&cli.config).await,
        Commands::ResetState => commands::run_reset_state(&cli.config).await,
        Commands::Positions => commands::run_positions(&cli.config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<MonitorError>() {
                Some(MonitorError::Config(_)) => ExitCode::from(commands::check::EXIT_CONFIG_FAILURE),
                _ => ExitCode::from(commands::check::EXIT_RUN_FAILURE),
            }
        }
    }
}

/// Logs go to stderr (stdout carries command output) or to `log_file`.
fn init_logging(log_file: Option<&PathBuf>) -> std::io::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}
