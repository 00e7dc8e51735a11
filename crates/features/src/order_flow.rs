//! Order flow aggregation.
//!
//! Aggregates classified trades over a rolling window of ticks.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_core::Side;

/// Volume totals by aggressor side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowTotals {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub unknown_volume: f64,
}

impl FlowTotals {
    fn add(&mut self, volume: f64, side: Side) {
        match side {
            Side::Buy => self.buy_volume += volume,
            Side::Sell => self.sell_volume += volume,
            Side::Unknown => self.unknown_volume += volume,
        }
    }

    fn sub(&mut self, volume: f64, side: Side) {
        self.add(-volume, side);
    }

    fn zero_side(&mut self, side: Side) {
        match side {
            Side::Buy => self.buy_volume = 0.0,
            Side::Sell => self.sell_volume = 0.0,
            Side::Unknown => self.unknown_volume = 0.0,
        }
    }

    pub fn total_volume(&self) -> f64 {
        self.buy_volume + self.sell_volume + self.unknown_volume
    }

    /// Buy minus sell volume.
    pub fn net_flow(&self) -> f64 {
        self.buy_volume - self.sell_volume
    }

    /// Net flow over total volume, in [-1, 1].
    pub fn imbalance(&self) -> Option<f64> {
        let total = self.total_volume();
        (total > 0.0).then(|| (self.net_flow() / total).clamp(-1.0, 1.0))
    }

    /// Fraction of volume with no inferable side.
    pub fn unknown_frac(&self) -> f64 {
        let total = self.total_volume();
        if total > 0.0 {
            self.unknown_volume / total
        } else {
            0.0
        }
    }
}

/// Order flow imbalance over the last `window` ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFlowWindow {
    /// Window size in ticks.
    window: usize,
    /// Classified trades in the window.
    trades: VecDeque<(f64, Side)>,
    /// Running totals over `trades`.
    totals: FlowTotals,
    /// Trades with positive volume per side (buy, sell, unknown).
    live: [usize; 3],
}

fn slot(side: Side) -> usize {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
        Side::Unknown => 2,
    }
}

impl OrderFlowWindow {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            trades: VecDeque::with_capacity(window + 1),
            totals: FlowTotals::default(),
            live: [0; 3],
        }
    }

    /// Add a classified trade and return the imbalance once the window is full.
    pub fn add_trade(&mut self, volume: f64, side: Side) -> Option<f64> {
        self.trades.push_back((volume, side));
        self.totals.add(volume, side);
        if volume > 0.0 {
            self.live[slot(side)] += 1;
        }
        if self.trades.len() > self.window {
            if let Some((old_volume, old_side)) = self.trades.pop_front() {
                self.totals.sub(old_volume, old_side);
                if old_volume > 0.0 {
                    self.live[slot(old_side)] -= 1;
                }
                // A side with no volume left holds exactly zero, not eviction residue.
                if self.live[slot(old_side)] == 0 {
                    self.totals.zero_side(old_side);
                }
            }
        }
        self.imbalance()
    }

    pub fn imbalance(&self) -> Option<f64> {
        if self.trades.len() < self.window || self.live.iter().all(|&n| n == 0) {
            return None;
        }
        self.totals.imbalance()
    }

    pub fn totals(&self) -> FlowTotals {
        self.totals
    }

    /// Get the number of trades tracked.
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.trades.clear();
        self.totals = FlowTotals::default();
        self.live = [0; 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut flow = OrderFlowWindow::new(3);
        flow.add_trade(1.0, Side::Buy);
        flow.add_trade(2.0, Side::Sell);
        let ofi = flow.add_trade(0.5, Side::Unknown).unwrap();

        let totals = flow.totals();
        assert!((totals.buy_volume - 1.0).abs() < 1e-10);
        assert!((totals.sell_volume - 2.0).abs() < 1e-10);
        assert!((totals.unknown_volume - 0.5).abs() < 1e-10);
        assert!((totals.net_flow() - (-1.0)).abs() < 1e-10);
        assert!((ofi - (-1.0 / 3.5)).abs() < 1e-10);
        assert!((totals.unknown_frac() - 0.5 / 3.5).abs() < 1e-10);
    }

    #[test]
    fn test_warmup() {
        let mut flow = OrderFlowWindow::new(2);
        assert!(flow.add_trade(1.0, Side::Buy).is_none());
        assert!(flow.add_trade(1.0, Side::Buy).is_some());
    }

    #[test]
    fn test_rolling_window() {
        let mut flow = OrderFlowWindow::new(2);
        flow.add_trade(10.0, Side::Buy);
        flow.add_trade(10.0, Side::Buy);
        assert!((flow.imbalance().unwrap() - 1.0).abs() < 1e-10);
        flow.add_trade(10.0, Side::Sell);
        flow.add_trade(10.0, Side::Sell);
        assert!((flow.imbalance().unwrap() - (-1.0)).abs() < 1e-10);
        assert_eq!(flow.trade_count(), 2);
    }

    #[test]
    fn test_zero_volume_window_undefined() {
        let mut flow = OrderFlowWindow::new(2);
        flow.add_trade(0.0, Side::Buy);
        assert!(flow.add_trade(0.0, Side::Sell).is_none());
    }

    #[test]
    fn test_clear() {
        let mut flow = OrderFlowWindow::new(1);
        flow.add_trade(1.0, Side::Buy);
        flow.clear();
        assert_eq!(flow.trade_count(), 0);
        assert_eq!(flow.totals(), FlowTotals::default());
    }

    #[test]
    fn test_window_of_zero_volume_after_eviction_undefined() {
        let mut flow = OrderFlowWindow::new(2);
        flow.add_trade(0.1, Side::Buy);
        flow.add_trade(0.2, Side::Buy);
        flow.add_trade(0.0, Side::Sell);
        assert!(flow.add_trade(0.0, Side::Sell).is_none());
        assert_eq!(flow.totals(), FlowTotals::default());
    }

    #[test]
    fn test_evicted_side_leaves_no_residue() {
        let mut flow = OrderFlowWindow::new(2);
        flow.add_trade(0.1, Side::Buy);
        flow.add_trade(0.2, Side::Buy);
        flow.add_trade(0.3, Side::Sell);
        let ofi = flow.add_trade(0.3, Side::Sell).unwrap();
        assert_eq!(flow.totals().buy_volume, 0.0);
        assert_eq!(ofi, -1.0);
    }
}
