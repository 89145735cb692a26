use crate::formatter::Notification;
use crate::position::{Snapshot, StoredSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of an account's currently open positions.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_snapshot(&self, account: &str) -> Result<Snapshot>;
}

/// Persistence for the last observed snapshot of each account.
///
/// Implementations keep at most one record per account: `save` overwrites.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the latest record for `account`, or `None` if none was ever saved.
    async fn load(&self, account: &str) -> Result<Option<StoredSnapshot>>;

    /// Replaces the record for `account`, purging any superseded duplicates.
    async fn save(&self, account: &str, snapshot: &Snapshot, updated_at: DateTime<Utc>)
        -> Result<()>;

    /// Deletes every record for `account`. Returns how many were removed.
    async fn clear(&self, account: &str) -> Result<usize>;
}

/// Delivery channel for rendered alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;

    fn name(&self) -> &str;
}
