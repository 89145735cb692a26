//! One monitoring run.

use crate::app::{build_monitor, load_config};
use crate::commands::print_json;
use clap::Args;
use position_alert_core::{DeliveryMode, RunReport};
use std::path::Path;
use std::process::ExitCode;
use tracing::error;

/// Exit status for a run that started but failed.
pub const EXIT_RUN_FAILURE: u8 = 1;
/// Exit status for a configuration problem; nothing was contacted.
pub const EXIT_CONFIG_FAILURE: u8 = 2;

/// Arguments for the check command.
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Log alerts instead of emailing them
    #[arg(long)]
    pub dry_run: bool,

    /// Send one email per change instead of one per run
    #[arg(long)]
    pub per_event: bool,
}

/// Runs the check command and prints the run report.
pub async fn run_check(config_path: &Path, args: CheckArgs) -> ExitCode {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => return config_failure("", &e),
    };
    if args.dry_run {
        config.monitor.dry_run = true;
    }
    if args.per_event {
        config.monitor.delivery = DeliveryMode::PerEvent;
    }

    let monitor = match build_monitor(&config) {
        Ok(monitor) => monitor,
        Err(e) => return config_failure(&config.monitor.address, &e),
    };

    let report = monitor.run().await;
    emit(&report);

    if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_RUN_FAILURE)
    }
}

fn config_failure(account: &str, err: &position_alert_core::MonitorError) -> ExitCode {
    error!("{}", err);
    emit(&RunReport::failure(account, err));
    ExitCode::from(EXIT_CONFIG_FAILURE)
}

fn emit(report: &RunReport) {
    if let Err(e) = print_json(report) {
        error!("Failed to print run report: {}", e);
    }
}
