//! Local JSON file backend.
//!
//! One file holds the latest snapshot of every monitored account. Writes go
//! to a sibling temp file which is then renamed over the original, so a
//! crash mid-write leaves the previous state intact.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use position_alert_core::{Snapshot, StateStore, StoredSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors from file persistence operations.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// IO error reading/writing file.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk layout: account address to its latest record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub snapshot: Snapshot,
    pub updated_at: DateTime<Utc>,
}

/// [`StateStore`] backed by a single JSON file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole state file. A missing file is an empty state.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid JSON.
    pub async fn read_state(&self) -> Result<StateFile, PersistenceError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet");
                Ok(StateFile::default())
            }
            Err(e) => Err(PersistenceError::io(&self.path, e)),
        }
    }

    async fn write_state(&self, state: &StateFile) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::io(parent, e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp, json)
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;

        Ok(())
    }

    /// Reads the state for a rewrite; a corrupt file is replaced rather than fatal.
    async fn read_for_update(&self) -> Result<StateFile, PersistenceError> {
        match self.read_state().await {
            Ok(state) => Ok(state),
            Err(PersistenceError::Json(e)) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file is corrupt, starting fresh"
                );
                Ok(StateFile::default())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, account: &str) -> anyhow::Result<Option<StoredSnapshot>> {
        let state = self.read_state().await?;

        Ok(state.accounts.get(account).map(|record| StoredSnapshot {
            account: account.to_string(),
            snapshot: record.snapshot.clone(),
            updated_at: Some(record.updated_at),
        }))
    }

    async fn save(
        &self,
        account: &str,
        snapshot: &Snapshot,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut state = self.read_for_update().await?;
        state.accounts.insert(
            account.to_string(),
            AccountRecord {
                snapshot: snapshot.clone(),
                updated_at,
            },
        );
        self.write_state(&state).await?;

        debug!(
            path = %self.path.display(),
            account,
            positions = snapshot.len(),
            "Saved position state"
        );
        Ok(())
    }

    async fn clear(&self, account: &str) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut state = self.read_for_update().await?;
        if state.accounts.remove(account).is_none() {
            return Ok(0);
        }
        self.write_state(&state).await?;

        info!(path = %self.path.display(), account, "Cleared persisted state");
        Ok(1)
    }
}
