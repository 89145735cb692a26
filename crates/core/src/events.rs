use crate::position::{Direction, Position};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Opened,
    Increased,
    Decreased,
    Closed,
}

impl ChangeKind {
    /// Human label used in alert subjects and bodies.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Opened => "New Position Opened",
            Self::Increased => "Position Increased",
            Self::Decreased => "Position Decreased",
            Self::Closed => "Position Closed",
        }
    }
}

/// The transition itself, carrying the positions relevant to its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionChange {
    Opened { current: Position },
    Increased { previous: Position, current: Position },
    Decreased { previous: Position, current: Position },
    Closed { previous: Position },
}

/// One classified change for one asset between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub asset: String,
    #[serde(flatten)]
    pub change: PositionChange,
    pub generated_at: DateTime<Utc>,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(asset: impl Into<String>, change: PositionChange, generated_at: DateTime<Utc>) -> Self {
        Self {
            asset: asset.into(),
            change,
            generated_at,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self.change {
            PositionChange::Opened { .. } => ChangeKind::Opened,
            PositionChange::Increased { .. } => ChangeKind::Increased,
            PositionChange::Decreased { .. } => ChangeKind::Decreased,
            PositionChange::Closed { .. } => ChangeKind::Closed,
        }
    }

    /// The position to display: the current one, or the last known one for a close.
    #[must_use]
    pub const fn position(&self) -> &Position {
        match &self.change {
            PositionChange::Opened { current }
            | PositionChange::Increased { current, .. }
            | PositionChange::Decreased { current, .. } => current,
            PositionChange::Closed { previous } => previous,
        }
    }

    #[must_use]
    pub const fn previous(&self) -> Option<&Position> {
        match &self.change {
            PositionChange::Opened { .. } => None,
            PositionChange::Increased { previous, .. }
            | PositionChange::Decreased { previous, .. }
            | PositionChange::Closed { previous } => Some(previous),
        }
    }

    #[must_use]
    pub const fn current(&self) -> Option<&Position> {
        match &self.change {
            PositionChange::Closed { .. } => None,
            PositionChange::Opened { current }
            | PositionChange::Increased { current, .. }
            | PositionChange::Decreased { current, .. } => Some(current),
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.position().direction()
    }

    /// `|current| - |previous|` for resize events, `None` otherwise.
    #[must_use]
    pub fn size_delta(&self) -> Option<Decimal> {
        match &self.change {
            PositionChange::Increased { previous, current }
            | PositionChange::Decreased { previous, current } => {
                Some(current.abs_size() - previous.abs_size())
            }
            PositionChange::Opened { .. } | PositionChange::Closed { .. } => None,
        }
    }
}
