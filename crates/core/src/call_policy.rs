//! Timeout and retry policy applied to every external call of a run.

use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded timeout plus at most one retry per external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            retries: Self::MAX_RETRIES,
            backoff: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    pub const MAX_RETRIES: u32 = 1;

    /// Creates a policy; `retries` is capped at [`CallPolicy::MAX_RETRIES`].
    #[must_use]
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries: retries.min(Self::MAX_RETRIES),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs `call` under the timeout, retrying once on failure.
    ///
    /// # Errors
    /// Returns the last attempt's error, or a timeout error.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                )),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.retries,
                        error = %e,
                        delay_ms = self.backoff.as_millis(),
                        "{} failed, retrying",
                        operation
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
