//! Inspect or reset the persisted snapshot.

use crate::app::{build_store, load_config, resolve_account};
use crate::commands::print_json;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize)]
struct ResetOutcome<'a> {
    account: &'a str,
    removed: usize,
}

/// Prints the stored record for the configured account, or `null`.
///
/// # Errors
/// Returns error if configuration is invalid or the store cannot be read.
pub async fn run_show_state(config_path: &Path) -> Result<()> {
    let mut config = load_config(config_path)?;
    // Email settings are irrelevant here.
    config.monitor.dry_run = true;
    let account = resolve_account(&config)?;

    let store = build_store(&config)?;
    let record = store.load(&account).await?;
    if record.is_none() {
        info!("No persisted state for {}", account);
    }

    print_json(&record)
}

/// Deletes every stored record for the configured account.
///
/// The next check treats all open positions as newly opened.
///
/// # Errors
/// Returns error if configuration is invalid or the store cannot be written.
pub async fn run_reset_state(config_path: &Path) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.monitor.dry_run = true;
    let account = resolve_account(&config)?;

    let store = build_store(&config)?;
    let removed = store.clear(&account).await?;
    info!("Removed {} state record(s) for {}", removed, account);

    print_json(&ResetOutcome {
        account: &account,
        removed,
    })
}
