//! Trade side inference.
//!
//! Assigns a direction to each tick: the reported side when the source provides one,
//! otherwise (optionally) the price against the prevailing quote, otherwise the tick
//! rule with zero-tick continuation.

use serde::{Deserialize, Serialize};
use tickbar_core::{SignRule, Side, Tick};

/// Statistics about trade classification quality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationStats {
    /// Total ticks classified.
    pub total_ticks: u64,
    /// Ticks classified as buy.
    pub buy_ticks: u64,
    /// Ticks classified as sell.
    pub sell_ticks: u64,
    /// Ticks left unknown.
    pub unknown_ticks: u64,
    /// Total volume processed.
    pub total_volume: f64,
    /// Buy volume.
    pub buy_volume: f64,
    /// Sell volume.
    pub sell_volume: f64,
    /// Unknown volume.
    pub unknown_volume: f64,
    /// Ticks signed from the reported side.
    pub from_reported: u64,
    /// Ticks signed against the quote.
    pub from_quote: u64,
    /// Ticks signed by the tick rule.
    pub from_tick_rule: u64,
}

impl ClassificationStats {
    /// Get the fraction of unknown volume.
    pub fn unknown_frac(&self) -> f64 {
        if self.total_volume > 0.0 {
            self.unknown_volume / self.total_volume
        } else {
            0.0
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Tick classifier holding the tick-rule state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickClassifier {
    rule: SignRule,
    /// Last trade price (for tick rule).
    last_price: Option<f64>,
    /// Last known side (for zero-tick continuation).
    last_side: Side,
    stats: ClassificationStats,
}

impl TickClassifier {
    /// Create a new classifier.
    pub fn new(rule: SignRule) -> Self {
        Self {
            rule,
            last_price: None,
            last_side: Side::Unknown,
            stats: ClassificationStats::default(),
        }
    }

    /// Classify a tick and advance the tick-rule state.
    pub fn classify(&mut self, tick: &Tick) -> Side {
        let reported = tick.side.filter(|s| *s != Side::Unknown);

        let side = if let Some(side) = reported {
            self.stats.from_reported += 1;
            side
        } else if let Some(side) = self.quote_side(tick) {
            self.stats.from_quote += 1;
            side
        } else {
            let side = self.tick_rule(tick.price);
            if side != Side::Unknown {
                self.stats.from_tick_rule += 1;
            }
            side
        };

        self.stats.total_ticks += 1;
        self.stats.total_volume += tick.volume;
        match side {
            Side::Buy => {
                self.stats.buy_ticks += 1;
                self.stats.buy_volume += tick.volume;
            }
            Side::Sell => {
                self.stats.sell_ticks += 1;
                self.stats.sell_volume += tick.volume;
            }
            Side::Unknown => {
                self.stats.unknown_ticks += 1;
                self.stats.unknown_volume += tick.volume;
            }
        }

        self.last_price = Some(tick.price);
        if side != Side::Unknown {
            self.last_side = side;
        }
        side
    }

    /// Classify based on price vs bid/ask.
    fn quote_side(&self, tick: &Tick) -> Option<Side> {
        if self.rule != SignRule::QuoteThenTick {
            return None;
        }
        let (bid, ask) = tick.quote()?;
        if tick.price >= ask {
            Some(Side::Buy)
        } else if tick.price <= bid {
            Some(Side::Sell)
        } else {
            None
        }
    }

    fn tick_rule(&self, price: f64) -> Side {
        match self.last_price {
            Some(last) if price > last => Side::Buy,
            Some(last) if price < last => Side::Sell,
            // Zero-tick continuation
            Some(_) => self.last_side,
            None => Side::Unknown,
        }
    }

    /// Get classification statistics.
    pub fn stats(&self) -> &ClassificationStats {
        &self.stats
    }

    /// Clear all state (last trade info, statistics).
    pub fn clear(&mut self) {
        self.last_price = None;
        self.last_side = Side::Unknown;
        self.stats.reset();
    }
}
