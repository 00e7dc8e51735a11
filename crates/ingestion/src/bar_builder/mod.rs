//! Bar building from normalized ticks.
//!
//! Each sampling scheme is a state machine implementing [`BarAccumulator`]. The set of
//! schemes is closed: [`BarStrategy`] is selected once from a [`BarSpec`] and
//! dispatches statically. [`BarBuilder`] wraps the strategy with trade-side inference
//! and the end-of-stream policy.

mod accumulator;
pub mod adaptive;
pub mod threshold;
pub mod time;

pub use accumulator::BarInProgress;
pub use adaptive::{AdaptiveThreshold, Ewma, ImbalanceBars, RunBars};
pub use threshold::{Measure, ThresholdBars};
pub use time::TimeBars;

use crate::classifier::{ClassificationStats, TickClassifier};
use serde::{Deserialize, Serialize};
use tickbar_core::{
    Bar, BarSpec, BarType, EndOfStreamPolicy, PipelineConfig, Result, Side, SignRule, Tick,
};
use tracing::debug;

/// Shared capability of all bar state machines.
pub trait BarAccumulator {
    /// Add a signed tick. Returns the bar this tick closed, if any.
    fn accumulate(&mut self, tick: &Tick, side: Side) -> Option<Bar>;

    /// Further bars produced by the last `accumulate` call (empty time buckets).
    fn take_pending(&mut self) -> Option<Bar> {
        None
    }

    /// Close the in-flight bar regardless of threshold.
    fn flush(&mut self) -> Option<Bar>;

    /// Discard the in-flight bar.
    fn reset(&mut self);
}

/// The closed set of bar sampling schemes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BarStrategy {
    Time(TimeBars),
    Tick(ThresholdBars),
    Volume(ThresholdBars),
    Dollar(ThresholdBars),
    Imbalance(ImbalanceBars),
    Run(RunBars),
}

impl BarStrategy {
    /// Build the strategy for a spec. Misconfiguration is fatal here, before any tick.
    pub fn new(spec: &BarSpec) -> Result<Self> {
        spec.validate()?;
        Ok(match spec {
            BarSpec::Time {
                duration_us,
                empty_buckets,
            } => BarStrategy::Time(TimeBars::new(*duration_us, *empty_buckets)),
            BarSpec::Tick { ticks } => BarStrategy::Tick(ThresholdBars::ticks(*ticks)),
            BarSpec::Volume { threshold } => {
                BarStrategy::Volume(ThresholdBars::volume(*threshold))
            }
            BarSpec::Dollar { threshold } => {
                BarStrategy::Dollar(ThresholdBars::dollar(*threshold))
            }
            BarSpec::Imbalance(cfg) => BarStrategy::Imbalance(ImbalanceBars::new(cfg.clone())),
            BarSpec::Run(cfg) => BarStrategy::Run(RunBars::new(cfg.clone())),
        })
    }
}

macro_rules! dispatch {
    ($self:ident, $s:ident => $call:expr) => {
        match $self {
            BarStrategy::Time($s) => $call,
            BarStrategy::Tick($s) | BarStrategy::Volume($s) | BarStrategy::Dollar($s) => $call,
            BarStrategy::Imbalance($s) => $call,
            BarStrategy::Run($s) => $call,
        }
    };
}

impl BarAccumulator for BarStrategy {
    fn accumulate(&mut self, tick: &Tick, side: Side) -> Option<Bar> {
        dispatch!(self, s => s.accumulate(tick, side))
    }

    fn take_pending(&mut self) -> Option<Bar> {
        dispatch!(self, s => s.take_pending())
    }

    fn flush(&mut self) -> Option<Bar> {
        dispatch!(self, s => s.flush())
    }

    fn reset(&mut self) {
        dispatch!(self, s => s.reset())
    }
}

/// Bar builder for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarBuilder {
    bar_type: BarType,
    strategy: BarStrategy,
    classifier: TickClassifier,
    end_of_stream: EndOfStreamPolicy,
    bars_emitted: u64,
}

impl BarBuilder {
    /// Create a new bar builder.
    pub fn new(
        spec: &BarSpec,
        sign_rule: SignRule,
        end_of_stream: EndOfStreamPolicy,
    ) -> Result<Self> {
        Ok(Self {
            bar_type: spec.bar_type(),
            strategy: BarStrategy::new(spec)?,
            classifier: TickClassifier::new(sign_rule),
            end_of_stream,
            bars_emitted: 0,
        })
    }

    /// Create a bar builder from a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(&config.bar, config.sign_rule, config.end_of_stream)
    }

    /// Add a tick. Returns the bar it closed, if any; see [`BarBuilder::push`] for
    /// schemes that can close several bars at once.
    pub fn accumulate(&mut self, tick: &Tick) -> Option<Bar> {
        let side = self.classifier.classify(tick);
        let bar = self.strategy.accumulate(tick, side);
        if let Some(bar) = &bar {
            self.on_emit(bar);
        }
        bar
    }

    /// Add a tick and append every bar it completed to `out`, in time order.
    pub fn push(&mut self, tick: &Tick, out: &mut Vec<Bar>) {
        if let Some(bar) = self.accumulate(tick) {
            out.push(bar);
        }
        while let Some(bar) = self.strategy.take_pending() {
            self.on_emit(&bar);
            out.push(bar);
        }
    }

    /// End of stream: emit or discard the partial bar per policy.
    pub fn finish(&mut self) -> Option<Bar> {
        let partial = self.strategy.flush()?;
        match self.end_of_stream {
            EndOfStreamPolicy::Emit => {
                self.on_emit(&partial);
                Some(partial)
            }
            EndOfStreamPolicy::Discard => {
                debug!(
                    trade_count = partial.trade_count,
                    "discarded partial bar at end of stream"
                );
                None
            }
        }
    }

    /// Discard the in-flight bar, keeping learned thresholds and tick-rule state.
    pub fn reset(&mut self) {
        self.strategy.reset();
    }

    fn on_emit(&mut self, bar: &Bar) {
        self.bars_emitted += 1;
        debug!(
            bar_type = ?bar.bar_type,
            start = bar.timestamp_start,
            end = bar.timestamp_end,
            trade_count = bar.trade_count,
            reason = ?bar.trigger_reason,
            "bar closed"
        );
    }

    pub fn bar_type(&self) -> BarType {
        self.bar_type
    }

    pub fn strategy(&self) -> &BarStrategy {
        &self.strategy
    }

    pub fn bars_emitted(&self) -> u64 {
        self.bars_emitted
    }

    pub fn classification_stats(&self) -> &ClassificationStats {
        self.classifier.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tickbar_core::{AdaptiveConfig, EmptyBucketPolicy, ImbalanceKind, TriggerReason};

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

    fn all_specs() -> Vec<BarSpec> {
        let adaptive = |kind| AdaptiveConfig {
            kind,
            initial_threshold: 5.0,
            seed_bars: 3,
            ewma_alpha: 0.2,
            max_threshold_ratio: 5.0,
        };
        vec![
            BarSpec::Time {
                duration_us: 1_000,
                empty_buckets: EmptyBucketPolicy::Emit,
            },
            BarSpec::Time {
                duration_us: 1_000,
                empty_buckets: EmptyBucketPolicy::Skip,
            },
            BarSpec::Tick { ticks: 7 },
            BarSpec::Volume { threshold: 25.0 },
            BarSpec::Dollar { threshold: 2_500.0 },
            BarSpec::Imbalance(adaptive(ImbalanceKind::Tick)),
            BarSpec::Imbalance(adaptive(ImbalanceKind::Volume)),
            BarSpec::Run(adaptive(ImbalanceKind::Tick)),
            BarSpec::Run(adaptive(ImbalanceKind::Dollar)),
        ]
    }

    fn build_all(spec: &BarSpec, ticks: &[Tick]) -> Vec<Bar> {
        let mut builder =
            BarBuilder::new(spec, SignRule::TickRule, EndOfStreamPolicy::Emit).unwrap();
        let mut bars = Vec::new();
        for tick in ticks {
            builder.push(tick, &mut bars);
        }
        bars.extend(builder.finish());
        bars
    }

    #[test]
    fn test_misconfiguration_is_fatal() {
        let err = BarBuilder::new(
            &BarSpec::Volume { threshold: 0.0 },
            SignRule::TickRule,
            EndOfStreamPolicy::Emit,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_empty_stream_emits_nothing() {
        for spec in all_specs() {
            assert!(build_all(&spec, &[]).is_empty());
        }
    }

    #[test]
    fn test_end_of_stream_policy() {
        let ticks = vec![make_tick(0, 1.0, 1.0), make_tick(1, 1.0, 1.0)];
        let spec = BarSpec::Volume { threshold: 100.0 };

        let mut emit = BarBuilder::new(&spec, SignRule::TickRule, EndOfStreamPolicy::Emit).unwrap();
        let mut discard =
            BarBuilder::new(&spec, SignRule::TickRule, EndOfStreamPolicy::Discard).unwrap();
        for tick in &ticks {
            assert!(emit.accumulate(tick).is_none());
            assert!(discard.accumulate(tick).is_none());
        }
        let bar = emit.finish().unwrap();
        assert_eq!(bar.trigger_reason, TriggerReason::EndOfStream);
        assert_eq!(bar.trade_count, 2);
        assert!(discard.finish().is_none());
        assert_eq!(emit.bars_emitted(), 1);
        assert_eq!(discard.bars_emitted(), 0);
    }

    #[test]
    fn test_reset_discards_in_flight_bar() {
        let mut builder = BarBuilder::new(
            &BarSpec::Tick { ticks: 3 },
            SignRule::TickRule,
            EndOfStreamPolicy::Emit,
        )
        .unwrap();
        builder.accumulate(&make_tick(0, 1.0, 1.0));
        builder.accumulate(&make_tick(1, 1.0, 1.0));
        builder.reset();
        assert!(builder.accumulate(&make_tick(2, 1.0, 1.0)).is_none());
        assert!(builder.accumulate(&make_tick(3, 1.0, 1.0)).is_none());
        let bar = builder.accumulate(&make_tick(4, 1.0, 1.0)).unwrap();
        assert_eq!(bar.timestamp_start, 2);
    }

    #[test]
    fn test_builder_tracks_sides() {
        let mut builder = BarBuilder::new(
            &BarSpec::Tick { ticks: 3 },
            SignRule::TickRule,
            EndOfStreamPolicy::Emit,
        )
        .unwrap();
        builder.accumulate(&make_tick(0, 10.0, 1.0));
        builder.accumulate(&make_tick(1, 11.0, 2.0));
        let bar = builder.accumulate(&make_tick(2, 10.5, 4.0)).unwrap();
        assert_eq!(bar.buy_volume, 2.0);
        assert_eq!(bar.sell_volume, 4.0);
        assert_eq!(builder.classification_stats().unknown_ticks, 1);
    }

    fn tick_stream() -> impl Strategy<Value = Vec<Tick>> {
        prop::collection::vec((0i64..2_500, 90.0f64..110.0, 0.0f64..10.0), 0..300).prop_map(
            |raw| {
                let mut ts = 0i64;
                raw.into_iter()
                    .map(|(gap, price, volume)| {
                        ts += gap;
                        make_tick(ts, price, volume)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn bars_are_ordered_and_non_overlapping(ticks in tick_stream()) {
            for spec in all_specs() {
                let bars = build_all(&spec, &ticks);
                for bar in &bars {
                    prop_assert!(bar.is_consistent(), "{:?}", bar);
                }
                for pair in bars.windows(2) {
                    prop_assert!(pair[0].timestamp_end <= pair[1].timestamp_start,
                        "{:?} overlaps {:?}", pair[0], pair[1]);
                }
                let traded: u64 = bars.iter().map(|b| b.trade_count).sum();
                prop_assert_eq!(traded as usize, ticks.len());
            }
        }

        #[test]
        fn volume_bars_are_tight(ticks in tick_stream()) {
            let threshold = 25.0;
            let bars = build_all(&BarSpec::Volume { threshold }, &ticks);
            let mut idx = 0usize;
            for bar in &bars {
                let members = &ticks[idx..idx + bar.trade_count as usize];
                idx += bar.trade_count as usize;
                if bar.trigger_reason != TriggerReason::Threshold {
                    continue;
                }
                let before_close: f64 = members[..members.len() - 1]
                    .iter()
                    .map(|t| t.volume)
                    .sum();
                prop_assert!(bar.volume >= threshold);
                prop_assert!(before_close < threshold);
            }
        }

        #[test]
        fn dollar_bars_are_tight(ticks in tick_stream()) {
            let threshold = 2_500.0;
            let bars = build_all(&BarSpec::Dollar { threshold }, &ticks);
            let mut idx = 0usize;
            for bar in &bars {
                let members = &ticks[idx..idx + bar.trade_count as usize];
                idx += bar.trade_count as usize;
                if bar.trigger_reason != TriggerReason::Threshold {
                    continue;
                }
                let before_close: f64 = members[..members.len() - 1]
                    .iter()
                    .map(|t| t.dollar_value())
                    .sum();
                prop_assert!(bar.dollar_value >= threshold);
                prop_assert!(before_close < threshold);
            }
        }
    }
}
