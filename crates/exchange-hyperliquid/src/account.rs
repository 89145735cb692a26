//! Account state queries and the [`PositionSource`] backed by them.

use crate::client::HyperliquidClient;
use crate::error::Result;
use anyhow::Context;
use async_trait::async_trait;
use position_alert_core::{Position, PositionSource, Snapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Request bodies for the `/info` endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest<'a> {
    ClearinghouseState { user: &'a str },
}

/// Perpetuals account summary. Numbers arrive as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: RawPosition,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    pub coin: String,
    pub szi: Decimal,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
    #[serde(default)]
    pub liquidation_px: Option<Decimal>,
    #[serde(default)]
    pub margin_used: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pnl: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<RawLeverage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLeverage {
    pub value: Decimal,
}

impl From<RawPosition> for Position {
    fn from(raw: RawPosition) -> Self {
        Self {
            size: raw.szi,
            entry_price: raw.entry_px.unwrap_or_default(),
            liquidation_price: raw.liquidation_px,
            margin_used: raw.margin_used.unwrap_or_default(),
            unrealized_pnl: raw.unrealized_pnl,
            leverage: raw.leverage.map(|l| l.value),
        }
    }
}

impl ClearinghouseState {
    /// Open positions keyed by coin. Zero-size entries are dropped.
    #[must_use]
    pub fn into_snapshot(self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for AssetPosition { position } in self.asset_positions {
            let coin = position.coin.clone();
            if snapshot.contains(&coin) {
                debug!("Duplicate position entry for {}, keeping the last one", coin);
            }
            snapshot.insert(coin, position.into());
        }
        snapshot
    }
}

impl HyperliquidClient {
    /// Fetches the perpetuals account state for `user`.
    ///
    /// # Errors
    /// Returns error if the request fails or the response is malformed.
    pub async fn clearinghouse_state(&self, user: &str) -> Result<ClearinghouseState> {
        self.info(&InfoRequest::ClearinghouseState { user }).await
    }
}

/// Reads open perpetual positions from Hyperliquid.
pub struct HyperliquidPositionSource {
    client: HyperliquidClient,
}

impl HyperliquidPositionSource {
    #[must_use]
    pub const fn new(client: HyperliquidClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PositionSource for HyperliquidPositionSource {
    async fn fetch_snapshot(&self, account: &str) -> anyhow::Result<Snapshot> {
        let state = self
            .client
            .clearinghouse_state(account)
            .await
            .with_context(|| format!("clearinghouseState request for {account}"))?;

        let snapshot = state.into_snapshot();
        debug!("{} holds {} open position(s)", account, snapshot.len());
        Ok(snapshot)
    }
}
