//! Error taxonomy for a monitoring run.
//!
//! Each variant corresponds to one stage of the run and carries a message.
//! Whether a failure marks the run as failed depends on the stage; see
//! [`MonitorError::fails_run`].

use thiserror::Error;

/// Errors that can occur during a monitoring run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// A required setting is missing or invalid. Raised before any network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// The exchange could not be reached or returned a non-success response.
    #[error("failed to fetch positions: {0}")]
    Fetch(String),

    /// The previous snapshot could not be read. The run continues from an empty snapshot.
    #[error("failed to read previous state: {0}")]
    StoreRead(String),

    /// The new snapshot could not be written.
    #[error("failed to persist state: {0}")]
    StoreWrite(String),

    /// A notification could not be delivered.
    #[error("failed to send notification: {0}")]
    Notify(String),
}

impl MonitorError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if the error marks the run as failed.
    ///
    /// A store write failure does not abort anything (it is the last stage) but
    /// breaks the next run's comparison, so it fails the run.
    #[must_use]
    pub const fn fails_run(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Fetch(_) | Self::StoreWrite(_))
    }

    /// Short machine-readable name of the stage that failed.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Fetch(_) => "fetch",
            Self::StoreRead(_) => "store_read",
            Self::StoreWrite(_) => "store_write",
            Self::Notify(_) => "notify",
        }
    }
}
