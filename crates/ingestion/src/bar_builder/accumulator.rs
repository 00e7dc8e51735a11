//! OHLCV accumulation shared by all bar strategies.

use serde::{Deserialize, Serialize};
use tickbar_core::{Bar, BarType, Side, Tick, TimestampUs, TriggerReason};

/// A bar that's currently being built.
///
/// Fields hold zero until the first tick; `open` doubles as the "has ticks" flag.
/// Infinities are avoided so the state round-trips through JSON checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarInProgress {
    timestamp_start: TimestampUs,
    timestamp_end: TimestampUs,
    open: Option<f64>,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    dollar_value: f64,
    buy_volume: f64,
    sell_volume: f64,
    trade_count: u64,
}

impl BarInProgress {
    pub fn add_tick(&mut self, tick: &Tick, side: Side) {
        if self.open.is_none() {
            self.open = Some(tick.price);
            self.high = tick.price;
            self.low = tick.price;
            self.timestamp_start = tick.timestamp;
        }
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.timestamp_end = tick.timestamp;
        self.volume += tick.volume;
        self.dollar_value += tick.dollar_value();
        match side {
            Side::Buy => self.buy_volume += tick.volume,
            Side::Sell => self.sell_volume += tick.volume,
            Side::Unknown => {}
        }
        self.trade_count = self.trade_count.saturating_add(1);
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_none()
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count
    }

    pub fn close_price(&self) -> Option<f64> {
        self.open.map(|_| self.close)
    }

    fn vwap(&self) -> Option<f64> {
        if self.volume > 0.0 {
            Some(self.dollar_value / self.volume)
        } else {
            None
        }
    }

    /// Finish the bar over the span of its own ticks.
    pub fn to_bar(
        &self,
        bar_type: BarType,
        trigger_reason: TriggerReason,
        threshold: Option<f64>,
    ) -> Option<Bar> {
        self.to_bar_within(
            bar_type,
            self.timestamp_start,
            self.timestamp_end,
            trigger_reason,
            threshold,
        )
    }

    /// Finish the bar over explicit bounds (time buckets).
    pub fn to_bar_within(
        &self,
        bar_type: BarType,
        timestamp_start: TimestampUs,
        timestamp_end: TimestampUs,
        trigger_reason: TriggerReason,
        threshold: Option<f64>,
    ) -> Option<Bar> {
        let open = self.open?;
        Some(Bar {
            bar_type,
            timestamp_start,
            timestamp_end,
            open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            dollar_value: self.dollar_value,
            vwap: self.vwap(),
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            trade_count: self.trade_count,
            trigger_reason,
            threshold,
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A zero-volume bar flat at `price`.
pub fn flat_bar(
    bar_type: BarType,
    timestamp_start: TimestampUs,
    timestamp_end: TimestampUs,
    price: f64,
) -> Bar {
    Bar {
        bar_type,
        timestamp_start,
        timestamp_end,
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 0.0,
        dollar_value: 0.0,
        vwap: None,
        buy_volume: 0.0,
        sell_volume: 0.0,
        trade_count: 0,
        trigger_reason: TriggerReason::EmptyBucket,
        threshold: None,
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
    fn test_empty_has_no_bar() {
        let acc = BarInProgress::default();
        assert!(acc.is_empty());
        assert!(acc
            .to_bar(BarType::Tick, TriggerReason::Threshold, None)
            .is_none());
    }

    #[test]
    fn test_ohlcv() {
        let mut acc = BarInProgress::default();
        acc.add_tick(&make_tick(10, 100.0, 1.0), Side::Buy); // Open
        acc.add_tick(&make_tick(20, 105.0, 2.0), Side::Sell); // High
        acc.add_tick(&make_tick(30, 95.0, 1.0), Side::Unknown); // Low
        acc.add_tick(&make_tick(40, 101.0, 1.0), Side::Buy); // Close

        let bar = acc
            .to_bar(BarType::Tick, TriggerReason::Threshold, Some(4.0))
            .unwrap();
        assert_eq!(bar.timestamp_start, 10);
        assert_eq!(bar.timestamp_end, 40);
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.high, 105.0);
        assert_eq!(bar.low, 95.0);
        assert_eq!(bar.close, 101.0);
        assert_relative_eq!(bar.volume, 5.0);
        assert_relative_eq!(bar.buy_volume, 2.0);
        assert_relative_eq!(bar.sell_volume, 2.0);
        assert_eq!(bar.trade_count, 4);
        assert!(bar.is_consistent());
    }

    #[test]
    fn test_vwap() {
        // VWAP = (100*50000 + 200*50010) / 300
        let mut acc = BarInProgress::default();
        acc.add_tick(&make_tick(1, 50000.0, 100.0), Side::Buy);
        acc.add_tick(&make_tick(2, 50010.0, 200.0), Side::Buy);
        let bar = acc
            .to_bar(BarType::Volume, TriggerReason::Threshold, None)
            .unwrap();
        let expected_vwap = (100.0 * 50000.0 + 200.0 * 50010.0) / 300.0;
        assert_relative_eq!(bar.vwap.unwrap(), expected_vwap, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_volume_vwap_undefined() {
        let mut acc = BarInProgress::default();
        acc.add_tick(&make_tick(1, 10.0, 0.0), Side::Unknown);
        let bar = acc
            .to_bar(BarType::Tick, TriggerReason::Threshold, None)
            .unwrap();
        assert!(bar.vwap.is_none());
    }

    #[test]
    fn test_trade_count_past_u32() {
        let mut acc = BarInProgress::default();
        acc.add_tick(&make_tick(1, 10.0, 1.0), Side::Buy);
        acc.trade_count = u32::MAX as u64;
        acc.add_tick(&make_tick(2, 10.0, 1.0), Side::Sell);
        assert_eq!(acc.trade_count(), u32::MAX as u64 + 1);

        acc.trade_count = u64::MAX;
        acc.add_tick(&make_tick(3, 10.0, 1.0), Side::Sell);
        assert_eq!(acc.trade_count(), u64::MAX);
    }
}
