//! Builds the monitor and its collaborators from configuration.

use anyhow::Context;
use position_alert_core::{
    AppConfig, ConfigLoader, MonitorError, MonitorSettings, Notifier, PositionMonitor,
    PositionSource, StateStore, StoreBackend,
};
use position_alert_hyperliquid::{
    checksum_address, HyperliquidClient, HyperliquidClientConfig, HyperliquidPositionSource,
};
use position_alert_notify::{LogNotifier, SmtpNotifier, SmtpSettings};
use position_alert_store::{AppwriteClient, AppwriteConfig, DocumentStateStore, FileStateStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Loads configuration from `path` and the environment.
///
/// # Errors
/// Returns `MonitorError::Config` if the configuration cannot be parsed.
pub fn load_config(path: &Path) -> Result<AppConfig, MonitorError> {
    ConfigLoader::load_from(path).map_err(|e| MonitorError::config(format!("{e:#}")))
}

/// Validates `config` and returns the checksummed account address.
///
/// # Errors
/// Returns `MonitorError::Config` for missing settings or a malformed address.
pub fn resolve_account(config: &AppConfig) -> Result<String, MonitorError> {
    config.validate()?;
    checksum_address(&config.monitor.address).map_err(|e| MonitorError::config(e.to_string()))
}

/// # Errors
/// Returns error if the HTTP client cannot be built.
pub fn build_source(config: &AppConfig) -> anyhow::Result<Arc<dyn PositionSource>> {
    let client = HyperliquidClient::with_config(
        HyperliquidClientConfig::default()
            .with_base_url(&config.hyperliquid.api_url)
            .with_rate_limit(config.hyperliquid.requests_per_second)
            .with_timeout_secs(config.monitor.timeout_secs),
    )?;

    Ok(Arc::new(HyperliquidPositionSource::new(client)))
}

/// # Errors
/// Returns error if the configured backend cannot be set up.
pub fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn StateStore>> {
    let store = &config.store;
    match store.backend {
        StoreBackend::Appwrite => {
            let client = AppwriteClient::new(
                AppwriteConfig::new(
                    &store.endpoint,
                    &store.project_id,
                    &store.api_key,
                    &store.database_id,
                    &store.collection_id,
                )
                .with_timeout_secs(config.monitor.timeout_secs),
            )
            .context("configuring Appwrite store")?;
            Ok(Arc::new(DocumentStateStore::new(client)))
        }
        StoreBackend::File => Ok(Arc::new(FileStateStore::new(&store.path))),
    }
}

/// Log-only in dry-run mode, SMTP otherwise.
///
/// # Errors
/// Returns error if the email settings are unusable.
pub fn build_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    if config.monitor.dry_run {
        return Ok(Arc::new(LogNotifier));
    }

    let email = &config.email;
    let settings = SmtpSettings::new(
        &email.smtp_host,
        email.smtp_port,
        &email.sender,
        &email.password,
        &email.receiver,
    )
    .with_sender_name(&email.sender_name)
    .with_timeout(Duration::from_secs(config.monitor.timeout_secs));

    Ok(Arc::new(SmtpNotifier::new(settings).context("configuring SMTP")?))
}

/// Wires a [`PositionMonitor`] for the configured account.
///
/// # Errors
/// Returns `MonitorError::Config` for any configuration problem. No network
/// call is made.
pub fn build_monitor(config: &AppConfig) -> Result<PositionMonitor, MonitorError> {
    let account = resolve_account(config)?;
    let as_config_error = |e: anyhow::Error| MonitorError::config(format!("{e:#}"));

    let source = build_source(config).map_err(as_config_error)?;
    let store = build_store(config).map_err(as_config_error)?;
    let notifier = build_notifier(config).map_err(as_config_error)?;

    info!(
        account = %account,
        store = ?config.store.backend,
        notifier = notifier.name(),
        delivery = ?config.monitor.delivery,
        "Monitor configured"
    );

    let settings = MonitorSettings::new(account)
        .with_delivery(config.monitor.delivery)
        .with_call_policy(config.call_policy())
        .with_epsilon(config.monitor.epsilon);

    Ok(PositionMonitor::new(source, store, notifier, settings))
}
