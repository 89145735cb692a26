//! Rate-limited client for the Hyperliquid `/info` endpoint.

use crate::error::{HyperliquidError, Result};
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

pub const HYPERLIQUID_MAINNET_URL: &str = "https://api.hyperliquid.xyz";

#[derive(Debug, Clone)]
pub struct HyperliquidClientConfig {
    pub base_url: String,
    pub requests_per_second: NonZeroU32,
    pub timeout_secs: u64,
}

impl Default for HyperliquidClientConfig {
    fn default() -> Self {
        Self {
            base_url: HYPERLIQUID_MAINNET_URL.to_string(),
            // 1200 weight per minute; an info request costs 2-20
            requests_per_second: nonzero!(10u32),
            timeout_secs: 20,
        }
    }
}

impl HyperliquidClientConfig {
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit. Zero keeps the current limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        if let Some(rps) = NonZeroU32::new(requests_per_second) {
            self.requests_per_second = rps;
        }
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

pub struct HyperliquidClient {
    http_client: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>>,
}

impl HyperliquidClient {
    /// Creates a client for `base_url` with default limits.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(HyperliquidClientConfig::default().with_base_url(base_url))
    }

    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn with_config(config: HyperliquidClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HyperliquidError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_second(config.requests_per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a request to the `/info` endpoint.
    ///
    /// # Errors
    /// Returns error on network failure, non-success status or an unexpected body.
    pub async fn info<T: DeserializeOwned, B: Serialize + Sync>(&self, request: &B) -> Result<T> {
        self.post("/info", request).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}{}", self.base_url, endpoint);

        tracing::debug!("POST {}", url);

        let response = self.http_client.post(&url).json(body).send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(HyperliquidError::RateLimit);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HyperliquidError::api(status.as_u16(), text));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
