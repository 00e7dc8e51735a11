//! Bar/feature alignment.
//!
//! Every bar receives, per column, the most recent defined feature value whose
//! timestamp is at or before the bar's close. Columns never defined by then stay
//! undefined; nothing is filled backwards.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_core::{Bar, BarFeatureRow, FeatureColumn, FeatureValues, FeatureVector, TimestampUs};
use tracing::warn;

/// Per-column last-observation-carried-forward state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CarriedFeatures {
    values: FeatureValues,
    timestamp: Option<TimestampUs>,
}

impl CarriedFeatures {
    fn apply(&mut self, fv: &FeatureVector) {
        for column in FeatureColumn::ALL {
            if let Some(v) = fv.values.get(column) {
                self.values.set(column, Some(v));
            }
        }
        self.timestamp = Some(fv.timestamp);
    }

    fn row(&self, bar: Bar) -> BarFeatureRow {
        BarFeatureRow {
            bar,
            feature_timestamp: self.timestamp,
            features: self.values.clone(),
        }
    }
}

/// Merge-join a bar series with a feature series, both in time order.
pub fn align(bars: &[Bar], features: &[FeatureVector]) -> Vec<BarFeatureRow> {
    let mut carried = CarriedFeatures::default();
    let mut next = 0;
    bars.iter()
        .map(|bar| {
            while let Some(fv) = features.get(next) {
                if fv.timestamp > bar.timestamp_end {
                    break;
                }
                carried.apply(fv);
                next += 1;
            }
            carried.row(bar.clone())
        })
        .collect()
}

/// Streaming form of [`align`].
///
/// A bar is held until a feature vector strictly later than its close arrives, so
/// vectors sharing the close timestamp are still applied. Bars must be pushed before
/// any feature vector later than their close.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureAligner {
    pending: VecDeque<Bar>,
    carried: CarriedFeatures,
}

impl FeatureAligner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bar(&mut self, bar: Bar) {
        if let Some(ts) = self.carried.timestamp {
            if ts > bar.timestamp_end {
                warn!(
                    bar_end = bar.timestamp_end,
                    feature_timestamp = ts,
                    "bar arrived after later features were applied"
                );
            }
        }
        self.pending.push_back(bar);
    }

    /// Apply a feature vector, first releasing bars that closed strictly before it.
    pub fn push_feature(&mut self, fv: &FeatureVector, out: &mut Vec<BarFeatureRow>) {
        while self
            .pending
            .front()
            .is_some_and(|bar| bar.timestamp_end < fv.timestamp)
        {
            if let Some(bar) = self.pending.pop_front() {
                out.push(self.carried.row(bar));
            }
        }
        self.carried.apply(fv);
    }

    /// Release every held bar.
    pub fn finish(&mut self, out: &mut Vec<BarFeatureRow>) {
        while let Some(bar) = self.pending.pop_front() {
            out.push(self.carried.row(bar));
        }
    }

    /// Bars waiting for a later feature vector.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
