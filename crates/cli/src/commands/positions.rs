//! Fetch and print current positions without diffing or persisting.

use crate::app::{build_source, load_config, resolve_account};
use crate::commands::print_json;
use anyhow::Result;
use position_alert_core::Snapshot;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct PositionsOutput<'a> {
    account: &'a str,
    count: usize,
    positions: &'a Snapshot,
}

/// # Errors
/// Returns error if configuration is invalid or the fetch fails.
pub async fn run_positions(config_path: &Path) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.monitor.dry_run = true;
    let account = resolve_account(&config)?;

    let source = build_source(&config)?;
    let policy = config.call_policy();
    let source = &source;
    let account_ref = account.as_str();
    let snapshot = policy
        .call("fetch positions", move || source.fetch_snapshot(account_ref))
        .await?;

    print_json(&PositionsOutput {
        account: &account,
        count: snapshot.len(),
        positions: &snapshot,
    })
}
