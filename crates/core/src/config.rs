use crate::call_policy::CallPolicy;
use crate::diff::DEFAULT_SIZE_EPSILON;
use crate::error::MonitorError;
use crate::monitor::DeliveryMode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const REDACTED: &str = "[redacted]";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub hyperliquid: HyperliquidConfig,
    pub store: StoreConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Account to watch. Checksummed before use.
    pub address: String,
    pub delivery: DeliveryMode,
    pub epsilon: Decimal,
    pub timeout_secs: u64,
    pub retries: u32,
    /// Log alerts instead of emailing them.
    pub dry_run: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            delivery: DeliveryMode::default(),
            epsilon: DEFAULT_SIZE_EPSILON,
            timeout_secs: 20,
            retries: CallPolicy::MAX_RETRIES,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperliquidConfig {
    pub api_url: String,
    pub requests_per_second: u32,
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.hyperliquid.xyz".to_string(),
            requests_per_second: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Appwrite,
    File,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub collection_id: String,
    /// State file for the `file` backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoint: String::new(),
            project_id: String::new(),
            api_key: String::new(),
            database_id: String::new(),
            collection_id: String::new(),
            path: PathBuf::from("data/state.json"),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("api_key", &redact(&self.api_key))
            .field("database_id", &self.database_id)
            .field("collection_id", &self.collection_id)
            .field("path", &self.path)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    /// SMTP password. Whitespace is stripped before use.
    pub password: String,
    pub receiver: String,
    pub sender_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            sender: String::new(),
            password: String::new(),
            receiver: String::new(),
            sender_name: "Hyperliquid Monitor".to_string(),
        }
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("sender", &self.sender)
            .field("password", &redact(&self.password))
            .field("receiver", &self.receiver)
            .field("sender_name", &self.sender_name)
            .finish()
    }
}

fn redact(secret: &str) -> &str {
    if secret.is_empty() {
        ""
    } else {
        REDACTED
    }
}

impl AppConfig {
    /// Checks that every value the configured run needs is present.
    ///
    /// Store credentials are only required for the `appwrite` backend and
    /// email settings only outside dry-run mode.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Config` naming every missing or invalid value.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let mut missing = Vec::new();
        let mut require = |value: &str, name: &'static str| {
            if value.trim().is_empty() {
                missing.push(name);
            }
        };

        require(&self.monitor.address, "monitor.address (TARGET_ADDRESS)");
        require(&self.hyperliquid.api_url, "hyperliquid.api_url");

        if self.store.backend == StoreBackend::Appwrite {
            require(&self.store.endpoint, "store.endpoint (APPWRITE_ENDPOINT)");
            require(&self.store.project_id, "store.project_id (APPWRITE_PROJECT_ID)");
            require(&self.store.api_key, "store.api_key (APPWRITE_API_KEY)");
            require(&self.store.database_id, "store.database_id (APPWRITE_DATABASE_ID)");
            require(&self.store.collection_id, "store.collection_id (APPWRITE_COLLECTION_ID)");
        }

        if !self.monitor.dry_run {
            require(&self.email.smtp_host, "email.smtp_host");
            require(&self.email.sender, "email.sender (SENDER_EMAIL)");
            require(&self.email.password, "email.password (APP_PASSWORD)");
            require(&self.email.receiver, "email.receiver (RECEIVER_EMAIL)");
        }

        if !missing.is_empty() {
            return Err(MonitorError::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.monitor.timeout_secs == 0 {
            return Err(MonitorError::config("monitor.timeout_secs must be positive"));
        }
        if self.monitor.epsilon <= Decimal::ZERO {
            return Err(MonitorError::config("monitor.epsilon must be positive"));
        }
        if self.store.backend == StoreBackend::File && self.store.path.as_os_str().is_empty() {
            return Err(MonitorError::config("store.path must be set for the file backend"));
        }

        Ok(())
    }

    #[must_use]
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy::new(
            Duration::from_secs(self.monitor.timeout_secs),
            self.monitor.retries,
        )
    }
}
