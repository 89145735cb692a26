//! Run orchestration: fetch → load previous → diff → notify → persist.
//!
//! Each stage is isolated. Only a fetch failure aborts the run; a failed read
//! of the previous state degrades to an empty snapshot, failed notifications
//! are counted, and the fetched snapshot is always persisted once the fetch
//! succeeded.

use crate::call_policy::CallPolicy;
use crate::diff::{SnapshotDiffer, DEFAULT_SIZE_EPSILON};
use crate::error::MonitorError;
use crate::events::ChangeEvent;
use crate::formatter::{Notification, NotificationFormatter};
use crate::position::Snapshot;
use crate::traits::{Notifier, PositionSource, StateStore};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How detected changes are turned into messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One message containing every change.
    #[default]
    Batched,
    /// One message per change.
    PerEvent,
}

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub account: String,
    pub delivery: DeliveryMode,
    pub call_policy: CallPolicy,
    pub epsilon: Decimal,
}

impl MonitorSettings {
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            delivery: DeliveryMode::default(),
            call_policy: CallPolicy::default(),
            epsilon: DEFAULT_SIZE_EPSILON,
        }
    }

    #[must_use]
    pub const fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    #[must_use]
    pub const fn with_call_policy(mut self, call_policy: CallPolicy) -> Self {
        self.call_policy = call_policy;
        self
    }

    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: Decimal) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Outcome of one run, in the same shape whether it succeeded or not.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub message: String,
    pub account: String,
    pub change_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ChangeEvent>,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl RunReport {
    /// A report for a run that failed before producing any change.
    #[must_use]
    pub fn failure(account: impl Into<String>, err: &MonitorError) -> Self {
        Self {
            success: !err.fails_run(),
            message: "Check failed".to_string(),
            account: account.into(),
            change_count: 0,
            events: Vec::new(),
            notifications_sent: 0,
            notifications_failed: 0,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DeliveryOutcome {
    sent: usize,
    failed: usize,
}

/// Compares an account's live positions with the last persisted snapshot and
/// alerts on every change.
pub struct PositionMonitor {
    source: Arc<dyn PositionSource>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
    differ: SnapshotDiffer,
    formatter: NotificationFormatter,
}

impl PositionMonitor {
    pub fn new(
        source: Arc<dyn PositionSource>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        settings: MonitorSettings,
    ) -> Self {
        let differ = SnapshotDiffer::new(settings.epsilon);
        let formatter = NotificationFormatter::new(settings.account.clone());
        Self {
            source,
            store,
            notifier,
            settings,
            differ,
            formatter,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Executes one monitoring run. Never fails; failures are carried in the report.
    pub async fn run(&self) -> RunReport {
        let account = self.settings.account.as_str();
        info!("Checking positions for {}", account);

        let current = match self.fetch_current().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("{}", e);
                return RunReport::failure(account, &e);
            }
        };
        info!("Fetched {} open position(s)", current.len());

        let previous = self.load_previous().await;

        for asset in self.differ.sign_flips(&previous, &current) {
            warn!(
                "{} flipped direction at unchanged size; size-based diff raises no alert for it",
                asset
            );
        }

        let events = self.differ.diff(&previous, &current);
        let delivery = if events.is_empty() {
            info!("No position changes detected");
            DeliveryOutcome::default()
        } else {
            info!(
                "Found {} position change(s), sending notifications via {}",
                events.len(),
                self.notifier.name()
            );
            self.notify(&events).await
        };

        let persisted = self.persist(&current).await;

        let mut message = match events.len() {
            0 => "Check complete: no position changes".to_string(),
            n => format!("Check complete: {n} position change(s)"),
        };
        if delivery.failed > 0 {
            message.push_str(&format!(", {} notification(s) failed", delivery.failed));
        }

        let (success, error, error_kind) = match persisted {
            Ok(()) => (true, None, None),
            Err(e) => {
                message.push_str(", state not persisted");
                (!e.fails_run(), Some(e.to_string()), Some(e.kind()))
            }
        };

        RunReport {
            success,
            message,
            account: account.to_string(),
            change_count: events.len(),
            events,
            notifications_sent: delivery.sent,
            notifications_failed: delivery.failed,
            error,
            error_kind,
        }
    }

    async fn fetch_current(&self) -> Result<Snapshot, MonitorError> {
        let source = &self.source;
        let account = self.settings.account.as_str();

        self.settings
            .call_policy
            .call("fetch positions", move || source.fetch_snapshot(account))
            .await
            .map_err(|e| MonitorError::Fetch(format!("{e:#}")))
    }

    /// Loads the previous snapshot, falling back to empty on absence or failure.
    async fn load_previous(&self) -> Snapshot {
        let store = &self.store;
        let account = self.settings.account.as_str();

        let loaded = self
            .settings
            .call_policy
            .call("load state", move || store.load(account))
            .await;

        match loaded {
            Ok(Some(record)) => {
                info!(
                    "Loaded previous state with {} position(s) (updated {})",
                    record.snapshot.len(),
                    record
                        .updated_at
                        .map_or_else(|| "at an unknown time".to_string(), |t| t.to_rfc3339())
                );
                record.snapshot
            }
            Ok(None) => {
                warn!("No previous state for {}; treating every open position as new", account);
                Snapshot::new()
            }
            Err(e) => {
                let err = MonitorError::StoreRead(format!("{e:#}"));
                warn!("{}; continuing with empty previous state", err);
                Snapshot::new()
            }
        }
    }

    async fn notify(&self, events: &[ChangeEvent]) -> DeliveryOutcome {
        let notifications: Vec<Notification> = match self.settings.delivery {
            DeliveryMode::Batched => self.formatter.format_batch(events).into_iter().collect(),
            DeliveryMode::PerEvent => events.iter().map(|e| self.formatter.format(e)).collect(),
        };

        let mut outcome = DeliveryOutcome::default();
        for notification in &notifications {
            match self.send(notification).await {
                Ok(()) => {
                    info!("Notification sent: {}", notification.subject);
                    outcome.sent += 1;
                }
                Err(e) => {
                    error!("{} ({})", e, notification.subject);
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    async fn send(&self, notification: &Notification) -> Result<(), MonitorError> {
        let notifier = &self.notifier;

        self.settings
            .call_policy
            .call("send notification", move || notifier.send(notification))
            .await
            .map_err(|e| MonitorError::Notify(format!("{e:#}")))
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        let store = &self.store;
        let account = self.settings.account.as_str();
        let updated_at = Utc::now();

        let saved = self
            .settings
            .call_policy
            .call("save state", move || store.save(account, snapshot, updated_at))
            .await;

        match saved {
            Ok(()) => {
                info!("Persisted {} position(s) for {}", snapshot.len(), account);
                Ok(())
            }
            Err(e) => {
                let err = MonitorError::StoreWrite(format!("{e:#}"));
                error!("{}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use crate::position::{Position, StoredSnapshot};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::DateTime;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const ACCOUNT: &str = "0x5B5d51203a0F9079f8AEB098A6523A13F298C060";

    struct FakeSource {
        snapshot: Option<Snapshot>,
        failures_before_success: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn returning(snapshot: Snapshot) -> Arc<Self> {
            Arc::new(Self {
                snapshot: Some(snapshot),
                failures_before_success: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                snapshot: None,
                failures_before_success: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            })
        }

        fn flaky(snapshot: Snapshot, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                snapshot: Some(snapshot),
                failures_before_success: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PositionSource for FakeSource {
        async fn fetch_snapshot(&self, _account: &str) -> Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_before_success.load(Ordering::SeqCst) > 0 {
                self.failures_before_success.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow!("connection reset"));
            }
            self.snapshot
                .clone()
                .ok_or_else(|| anyhow!("API error: 502 - bad gateway"))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<String, StoredSnapshot>>,
        fail_load: AtomicBool,
        fail_save: AtomicBool,
        saves: AtomicUsize,
    }

    impl MemoryStore {
        fn with_record(snapshot: Snapshot) -> Arc<Self> {
            let store = Self::default();
            store.records.lock().unwrap().insert(
                ACCOUNT.to_string(),
                StoredSnapshot {
                    account: ACCOUNT.to_string(),
                    snapshot,
                    updated_at: DateTime::from_timestamp(1_700_000_000, 0),
                },
            );
            Arc::new(store)
        }

        fn stored(&self) -> Option<Snapshot> {
            self.records
                .lock()
                .unwrap()
                .get(ACCOUNT)
                .map(|r| r.snapshot.clone())
        }
    }

    #[async_trait]
    impl StateStore for MemoryStore {
        async fn load(&self, account: &str) -> Result<Option<StoredSnapshot>> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(anyhow!("store unavailable"));
            }
            Ok(self.records.lock().unwrap().get(account).cloned())
        }

        async fn save(
            &self,
            account: &str,
            snapshot: &Snapshot,
            updated_at: chrono::DateTime<Utc>,
        ) -> Result<()> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(anyhow!("permission denied"));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.records.lock().unwrap().insert(
                account.to_string(),
                StoredSnapshot {
                    account: account.to_string(),
                    snapshot: snapshot.clone(),
                    updated_at: Some(updated_at),
                },
            );
            Ok(())
        }

        async fn clear(&self, account: &str) -> Result<usize> {
            Ok(usize::from(self.records.lock().unwrap().remove(account).is_some()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        failing_sends: AtomicUsize,
    }

    impl RecordingNotifier {
        fn failing(count: usize) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                failing_sends: AtomicUsize::new(count),
            })
        }

        fn subjects(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.subject.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<()> {
            if self.failing_sends.load(Ordering::SeqCst) > 0 {
                self.failing_sends.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow!("smtp authentication failed"));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn btc(size: Decimal) -> Position {
        Position::new(size, dec!(60000), dec!(1000)).with_liquidation_price(dec!(55000))
    }

    fn settings() -> MonitorSettings {
        MonitorSettings::new(ACCOUNT).with_call_policy(
            CallPolicy::new(Duration::from_millis(500), 0).with_backoff(Duration::ZERO),
        )
    }

    fn monitor(
        source: Arc<FakeSource>,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        settings: MonitorSettings,
    ) -> PositionMonitor {
        PositionMonitor::new(source, store, notifier, settings)
    }

    #[tokio::test]
    async fn test_cold_start_reports_open_and_persists() {
        let current = Snapshot::new().with("BTC", btc(dec!(2.5)));
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let report = monitor(
            FakeSource::returning(current.clone()),
            store.clone(),
            notifier.clone(),
            settings(),
        )
        .run()
        .await;

        assert!(report.success);
        assert_eq!(report.account, ACCOUNT);
        assert_eq!(report.change_count, 1);
        assert_eq!(report.events[0].kind(), ChangeKind::Opened);
        assert_eq!(
            notifier.subjects(),
            vec!["Hyperliquid Alert: New Position Opened - BTC"]
        );
        assert_eq!(store.stored(), Some(current));
    }

    #[tokio::test]
    async fn test_unchanged_positions_send_nothing_but_still_persist() {
        let current = Snapshot::new().with("BTC", btc(dec!(2.5)));
        let store = MemoryStore::with_record(current.clone());
        let notifier = Arc::new(RecordingNotifier::default());

        let report = monitor(
            FakeSource::returning(current),
            store.clone(),
            notifier.clone(),
            settings(),
        )
        .run()
        .await;

        assert!(report.success);
        assert_eq!(report.change_count, 0);
        assert!(notifier.subjects().is_empty());
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_store_untouched() {
        let previous = Snapshot::new().with("BTC", btc(dec!(2.5)));
        let store = MemoryStore::with_record(previous.clone());
        let notifier = Arc::new(RecordingNotifier::default());

        let report = monitor(FakeSource::failing(), store.clone(), notifier.clone(), settings())
            .run()
            .await;

        assert!(!report.success);
        assert_eq!(report.error_kind, Some("fetch"));
        assert!(report.error.unwrap().contains("502"));
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(store.stored(), Some(previous));
        assert!(notifier.subjects().is_empty());
    }

    #[tokio::test]
    async fn test_store_read_failure_still_overwrites_with_fresh_snapshot() {
        let previous = Snapshot::new().with("ETH", btc(dec!(-3)));
        let current = Snapshot::new().with("BTC", btc(dec!(2.5)));
        let store = MemoryStore::with_record(previous);
        store.fail_load.store(true, Ordering::SeqCst);
        let notifier = Arc::new(RecordingNotifier::default());

        let report = monitor(
            FakeSource::returning(current.clone()),
            store.clone(),
            notifier,
            settings(),
        )
        .run()
        .await;

        assert!(report.success);
        // Read failure means empty previous state: BTC opened, ETH never seen as closed.
        assert_eq!(report.change_count, 1);
        assert_eq!(report.events[0].asset, "BTC");
        assert_eq!(store.stored(), Some(current));
    }

    #[tokio::test]
    async fn test_notify_failure_does_not_block_persist() {
        let current = Snapshot::new().with("BTC", btc(dec!(4)));
        let store = MemoryStore::with_record(Snapshot::new().with("BTC", btc(dec!(2.5))));
        let notifier = RecordingNotifier::failing(usize::MAX);

        let report = monitor(
            FakeSource::returning(current.clone()),
            store.clone(),
            notifier,
            settings(),
        )
        .run()
        .await;

        assert!(report.success);
        assert_eq!(report.events[0].kind(), ChangeKind::Increased);
        assert_eq!(report.events[0].size_delta(), Some(dec!(1.5)));
        assert_eq!(report.notifications_failed, 1);
        assert!(report.message.contains("1 notification(s) failed"));
        assert_eq!(store.stored(), Some(current));
    }

    #[tokio::test]
    async fn test_store_write_failure_fails_run() {
        let store = Arc::new(MemoryStore::default());
        store.fail_save.store(true, Ordering::SeqCst);
        let notifier = Arc::new(RecordingNotifier::default());

        let report = monitor(
            FakeSource::returning(Snapshot::new().with("BTC", btc(dec!(1)))),
            store,
            notifier.clone(),
            settings(),
        )
        .run()
        .await;

        assert!(!report.success);
        assert_eq!(report.error_kind, Some("store_write"));
        assert_eq!(report.change_count, 1);
        assert_eq!(notifier.subjects().len(), 1);
    }

    #[tokio::test]
    async fn test_batched_delivery_sends_one_message() {
        let previous = Snapshot::new()
            .with("BTC", btc(dec!(2.5)))
            .with("ETH", btc(dec!(-3)));
        let current = Snapshot::new()
            .with("BTC", btc(dec!(1)))
            .with("SOL", btc(dec!(50)));
        let notifier = Arc::new(RecordingNotifier::default());

        let report = monitor(
            FakeSource::returning(current),
            MemoryStore::with_record(previous),
            notifier.clone(),
            settings(),
        )
        .run()
        .await;

        assert_eq!(report.change_count, 3);
        assert_eq!(report.notifications_sent, 1);
        assert_eq!(
            notifier.subjects(),
            vec!["Hyperliquid Alert: 3 position changes (BTC, ETH, SOL)"]
        );
    }

    #[tokio::test]
    async fn test_per_event_delivery_continues_after_failure() {
        let current = Snapshot::new()
            .with("BTC", btc(dec!(1)))
            .with("ETH", btc(dec!(2)))
            .with("SOL", btc(dec!(3)));
        let notifier = RecordingNotifier::failing(1);

        let report = monitor(
            FakeSource::returning(current),
            Arc::new(MemoryStore::default()),
            notifier.clone(),
            settings().with_delivery(DeliveryMode::PerEvent),
        )
        .run()
        .await;

        assert!(report.success);
        assert_eq!(report.notifications_failed, 1);
        assert_eq!(report.notifications_sent, 2);
        assert_eq!(
            notifier.subjects(),
            vec![
                "Hyperliquid Alert: New Position Opened - ETH",
                "Hyperliquid Alert: New Position Opened - SOL",
            ]
        );
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_is_retried_once() {
        let source = FakeSource::flaky(Snapshot::new().with("BTC", btc(dec!(1))), 1);
        let policy = CallPolicy::new(Duration::from_millis(500), 1).with_backoff(Duration::ZERO);

        let report = monitor(
            source.clone(),
            Arc::new(MemoryStore::default()),
            Arc::new(RecordingNotifier::default()),
            settings().with_call_policy(policy),
        )
        .run()
        .await;

        assert!(report.success);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_report_shape() {
        let report = RunReport::failure(ACCOUNT, &MonitorError::config("TARGET_ADDRESS is not set"));

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["account"], ACCOUNT);
        assert_eq!(value["change_count"], 0);
        assert_eq!(value["error_kind"], "config");
        assert!(value.get("events").is_none());
    }
}
