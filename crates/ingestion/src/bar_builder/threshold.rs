//! Tick, volume and dollar bars: close once a fixed cumulative measure is reached.

use super::accumulator::BarInProgress;
use super::BarAccumulator;
use serde::{Deserialize, Serialize};
use tickbar_core::{Bar, BarType, Side, Tick, TriggerReason};

/// Quantity summed towards the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measure {
    Ticks,
    Volume,
    Dollar,
}

impl Measure {
    fn of(self, tick: &Tick) -> f64 {
        match self {
            Measure::Ticks => 1.0,
            Measure::Volume => tick.volume,
            Measure::Dollar => tick.dollar_value(),
        }
    }

    fn bar_type(self) -> BarType {
        match self {
            Measure::Ticks => BarType::Tick,
            Measure::Volume => BarType::Volume,
            Measure::Dollar => BarType::Dollar,
        }
    }
}

/// Fixed-threshold bar state machine.
///
/// The bar closes on the first tick that lifts the cumulative measure to the
/// threshold, so dropping the closing tick always leaves it below the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdBars {
    measure: Measure,
    threshold: f64,
    cumulative: f64,
    bar: BarInProgress,
}

impl ThresholdBars {
    pub fn new(measure: Measure, threshold: f64) -> Self {
        Self {
            measure,
            threshold,
            cumulative: 0.0,
            bar: BarInProgress::default(),
        }
    }

    pub fn ticks(count: u32) -> Self {
        Self::new(Measure::Ticks, count as f64)
    }

    pub fn volume(threshold: f64) -> Self {
        Self::new(Measure::Volume, threshold)
    }

    pub fn dollar(threshold: f64) -> Self {
        Self::new(Measure::Dollar, threshold)
    }

    /// Measure accumulated by the in-flight bar.
    pub fn cumulative(&self) -> f64 {
        self.cumulative
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl BarAccumulator for ThresholdBars {
    fn accumulate(&mut self, tick: &Tick, side: Side) -> Option<Bar> {
        self.bar.add_tick(tick, side);
        self.cumulative += self.measure.of(tick);
        if self.cumulative < self.threshold {
            return None;
        }
        let bar = self.bar.to_bar(
            self.measure.bar_type(),
            TriggerReason::Threshold,
            Some(self.threshold),
        );
        self.reset();
        bar
    }

    fn flush(&mut self) -> Option<Bar> {
        let bar = self.bar.to_bar(
            self.measure.bar_type(),
            TriggerReason::EndOfStream,
            Some(self.threshold),
        );
        self.reset();
        bar
    }

    fn reset(&mut self) {
        self.cumulative = 0.0;
        self.bar.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_tick(ts: i64, price: f64, volume: f64) -> Tick {
        Tick {
            timestamp: ts,
            price,
            volume,
            bid: None,
            ask: None,
            side: None,
        }
    }

    #[test]
    fn test_ten_ticks_of_ten_close_one_volume_bar() {
        let prices = [100.0, 101.0, 99.5, 102.0, 101.5, 98.0, 100.5, 103.0, 99.0, 100.2];
        let mut bars = ThresholdBars::volume(100.0);
        let mut closed = Vec::new();
        for (i, &price) in prices.iter().enumerate() {
            if let Some(bar) = bars.accumulate(&make_tick(i as i64, price, 10.0), Side::Unknown) {
                closed.push((i, bar));
            }
        }
        assert_eq!(closed.len(), 1);
        let (index, bar) = &closed[0];
        assert_eq!(*index, 9);
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.close, 100.2);
        assert_eq!(bar.high, 103.0);
        assert_eq!(bar.low, 98.0);
        assert_relative_eq!(bar.volume, 100.0);
        assert_eq!(bar.trade_count, 10);
    }

    #[test]
    fn test_tick_bars_exact_count() {
        let mut bars = ThresholdBars::ticks(3);
        let closes: Vec<bool> = (0..9)
            .map(|i| {
                bars.accumulate(&make_tick(i, 1.0, 1.0), Side::Buy)
                    .is_some()
            })
            .collect();
        assert_eq!(
            closes,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn test_single_large_tick_closes_alone() {
        let mut bars = ThresholdBars::volume(10.0);
        let bar = bars
            .accumulate(&make_tick(0, 1.0, 50.0), Side::Unknown)
            .unwrap();
        assert_eq!(bar.trade_count, 1);
        assert_eq!(bars.cumulative(), 0.0);
    }

    #[test]
    fn test_dollar_bars() {
        let mut bars = ThresholdBars::dollar(1_000.0);
        assert!(bars
            .accumulate(&make_tick(0, 100.0, 5.0), Side::Unknown)
            .is_none());
        let bar = bars
            .accumulate(&make_tick(1, 100.0, 5.0), Side::Unknown)
            .unwrap();
        assert_relative_eq!(bar.dollar_value, 1_000.0);
        assert_eq!(bar.bar_type, BarType::Dollar);
    }

    #[test]
    fn test_flush_partial() {
        let mut bars = ThresholdBars::volume(100.0);
        assert!(bars.flush().is_none());
        bars.accumulate(&make_tick(0, 1.0, 5.0), Side::Unknown);
        let bar = bars.flush().unwrap();
        assert_eq!(bar.trigger_reason, TriggerReason::EndOfStream);
        assert!(bars.flush().is_none());
    }
}
