//! Quote-derived spread features.

use crate::{order_stats::RollingPercentile, volatility::RollingStd};
use serde::{Deserialize, Serialize};
use tickbar_core::Tick;

/// Spread snapshot for one quoted tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadSnapshot {
    pub absolute: f64,
    pub mid: f64,
    pub relative: f64,
    /// Sample std of the absolute spread over the volatility window.
    pub volatility: Option<f64>,
    /// Average-rank percentile of the current spread within the percentile window.
    pub percentile: Option<f64>,
}

/// Tracks rolling spread statistics across quoted ticks.
///
/// Ticks without a quote leave the windows untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadTracker {
    volatility: RollingStd,
    percentile: RollingPercentile,
}

impl SpreadTracker {
    pub fn new(volatility_window: usize, percentile_window: usize) -> Self {
        Self {
            volatility: RollingStd::new(volatility_window),
            percentile: RollingPercentile::new(percentile_window),
        }
    }

    /// Update with a tick. Returns `None` when the tick carries no quote.
    pub fn update(&mut self, tick: &Tick) -> Option<SpreadSnapshot> {
        let (bid, ask) = tick.quote()?;
        let absolute = ask - bid;
        let mid = (bid + ask) / 2.0;
        let volatility = self.volatility.add(absolute);
        let percentile = self.percentile.update(absolute);
        Some(SpreadSnapshot {
            absolute,
            mid,
            relative: absolute / mid,
            volatility,
            percentile,
        })
    }

    pub fn clear(&mut self) {
        self.volatility.clear();
        self.percentile.clear();
    }
}
