use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One open position for one asset.
///
/// The asset symbol is not stored on the position itself; it is the key the
/// position is held under in a [`Snapshot`].
///
/// Field names match the stored record format (`szi`, `entryPx`, ...). The
/// descriptive names are accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Signed quantity. Positive is long, negative is short.
    #[serde(rename = "szi", alias = "size")]
    pub size: Decimal,
    #[serde(rename = "entryPx", alias = "entryPrice", alias = "entry_price")]
    pub entry_price: Decimal,
    #[serde(
        rename = "liquidationPx",
        alias = "liquidationPrice",
        alias = "liquidation_price",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub liquidation_price: Option<Decimal>,
    #[serde(rename = "marginUsed", alias = "margin_used", default)]
    pub margin_used: Decimal,
    #[serde(
        rename = "unrealizedPnl",
        alias = "unrealized_pnl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unrealized_pnl: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<Decimal>,
}

impl Position {
    #[must_use]
    pub const fn new(size: Decimal, entry_price: Decimal, margin_used: Decimal) -> Self {
        Self {
            size,
            entry_price,
            liquidation_price: None,
            margin_used,
            unrealized_pnl: None,
            leverage: None,
        }
    }

    #[must_use]
    pub fn with_liquidation_price(mut self, price: Decimal) -> Self {
        self.liquidation_price = Some(price);
        self
    }

    #[must_use]
    pub fn with_unrealized_pnl(mut self, pnl: Decimal) -> Self {
        self.unrealized_pnl = Some(pnl);
        self
    }

    #[must_use]
    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = Some(leverage);
        self
    }

    /// A zero-size position is no position at all.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    #[must_use]
    pub fn abs_size(&self) -> Decimal {
        self.size.abs()
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.size.is_sign_negative() {
            Direction::Short
        } else {
            Direction::Long
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => f.write_str("LONG"),
            Self::Short => f.write_str("SHORT"),
        }
    }
}

/// All positions open for one account at one point in time, keyed by asset.
///
/// Zero-size entries are never held: inserting one removes the asset, and
/// they are dropped when a snapshot is deserialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Position>",
    into = "BTreeMap<String, Position>"
)]
pub struct Snapshot {
    positions: BTreeMap<String, Position>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a position, or removes the asset when the position is flat.
    pub fn insert(&mut self, asset: impl Into<String>, position: Position) {
        let asset = asset.into();
        if position.is_flat() {
            self.positions.remove(&asset);
        } else {
            self.positions.insert(asset, position);
        }
    }

    /// Builder-style [`Snapshot::insert`].
    #[must_use]
    pub fn with(mut self, asset: impl Into<String>, position: Position) -> Self {
        self.insert(asset, position);
        self
    }

    #[must_use]
    pub fn get(&self, asset: &str) -> Option<&Position> {
        self.positions.get(asset)
    }

    #[must_use]
    pub fn contains(&self, asset: &str) -> bool {
        self.positions.contains_key(asset)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Asset symbols in ascending order.
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions.iter().map(|(asset, pos)| (asset.as_str(), pos))
    }
}

impl From<BTreeMap<String, Position>> for Snapshot {
    fn from(positions: BTreeMap<String, Position>) -> Self {
        positions.into_iter().collect()
    }
}

impl From<Snapshot> for BTreeMap<String, Position> {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.positions
    }
}

impl<S: Into<String>> FromIterator<(S, Position)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (S, Position)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (asset, position) in iter {
            snapshot.insert(asset, position);
        }
        snapshot
    }
}

/// The last snapshot persisted for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub account: String,
    pub snapshot: Snapshot,
    /// When the record was last written, if the store tracks it.
    pub updated_at: Option<DateTime<Utc>>,
}
