//! Snapshot diffing.
//!
//! Compares the previously persisted snapshot of an account with the freshly
//! fetched one and classifies every asset that changed. Classification is a
//! pure function of the two snapshots; the only time-dependent value is the
//! timestamp attached to each event for display.

use crate::events::{ChangeEvent, PositionChange};
use crate::position::{Position, Snapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Default size tolerance: `0.0001`.
pub const DEFAULT_SIZE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Classifies position changes between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotDiffer {
    epsilon: Decimal,
}

impl Default for SnapshotDiffer {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_SIZE_EPSILON,
        }
    }
}

impl SnapshotDiffer {
    /// Creates a differ with the given size tolerance.
    ///
    /// A non-positive tolerance falls back to [`DEFAULT_SIZE_EPSILON`], since
    /// upstream sizes carry float noise that an exact comparison would report.
    #[must_use]
    pub fn new(epsilon: Decimal) -> Self {
        if epsilon > Decimal::ZERO {
            Self { epsilon }
        } else {
            Self::default()
        }
    }

    #[must_use]
    pub const fn epsilon(&self) -> Decimal {
        self.epsilon
    }

    /// Diffs two snapshots, stamping events with the current time.
    #[must_use]
    pub fn diff(&self, previous: &Snapshot, current: &Snapshot) -> Vec<ChangeEvent> {
        self.diff_at(previous, current, Utc::now())
    }

    /// Diffs two snapshots, stamping events with `generated_at`.
    ///
    /// Events are ordered by asset symbol.
    #[must_use]
    pub fn diff_at(
        &self,
        previous: &Snapshot,
        current: &Snapshot,
        generated_at: DateTime<Utc>,
    ) -> Vec<ChangeEvent> {
        let assets: BTreeSet<&str> = previous.assets().chain(current.assets()).collect();

        assets
            .into_iter()
            .filter_map(|asset| {
                self.classify(asset, previous.get(asset), current.get(asset))
                    .map(|change| ChangeEvent::new(asset, change, generated_at))
            })
            .collect()
    }

    /// Assets whose direction flipped while their magnitude stayed within tolerance.
    ///
    /// These produce no event from [`SnapshotDiffer::diff`].
    #[must_use]
    pub fn sign_flips<'a>(&self, previous: &'a Snapshot, current: &Snapshot) -> Vec<&'a str> {
        previous
            .iter()
            .filter_map(|(asset, prev)| {
                let curr = current.get(asset)?;
                let flipped = prev.direction() != curr.direction();
                let same_size = (curr.abs_size() - prev.abs_size()).abs() <= self.epsilon;
                (flipped && same_size && !prev.is_flat() && !curr.is_flat()).then_some(asset)
            })
            .collect()
    }

    fn classify(
        &self,
        asset: &str,
        previous: Option<&Position>,
        current: Option<&Position>,
    ) -> Option<PositionChange> {
        // Flat entries count as absent.
        let previous = previous.filter(|p| !p.is_flat());
        let current = current.filter(|p| !p.is_flat());

        match (previous, current) {
            (None, None) => None,
            (None, Some(current)) => Some(PositionChange::Opened {
                current: current.clone(),
            }),
            (Some(previous), None) => Some(PositionChange::Closed {
                previous: previous.clone(),
            }),
            (Some(previous), Some(current)) => {
                let delta = current.abs_size() - previous.abs_size();
                if delta > self.epsilon {
                    Some(PositionChange::Increased {
                        previous: previous.clone(),
                        current: current.clone(),
                    })
                } else if delta < -self.epsilon {
                    Some(PositionChange::Decreased {
                        previous: previous.clone(),
                        current: current.clone(),
                    })
                } else {
                    tracing::trace!("{} unchanged (delta {})", asset, delta);
                    None
                }
            }
        }
    }
}
