//! Information-driven bars with self-tuning thresholds.
//!
//! Imbalance bars close when the signed sum of per-tick contributions reaches
//! `E[T] * |E[theta_tick]|`. Run bars close when the larger one-sided sum (buys or
//! sells) reaches `E[T] * max(P[buy] * E[c | buy], P[sell] * E[c | sell])`.
//!
//! Bootstrap policy: the first `seed_bars` bars close on the fixed
//! `initial_threshold`. The EWMAs are fed from the first bar onwards, only at bar
//! close, from the just-completed bar. Afterwards the threshold follows the EWMAs,
//! clamped to `[avg / max_threshold_ratio, avg * max_threshold_ratio]` where `avg`
//! is the mean of the thresholds at which all earlier bars closed.

use super::accumulator::BarInProgress;
use super::BarAccumulator;
use serde::{Deserialize, Serialize};
use tickbar_core::{AdaptiveConfig, Bar, BarType, Side, Tick, TriggerReason};
use tracing::debug;

/// Exponentially weighted moving average seeded by its first observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ewma {
    alpha: f64,
    value: Option<f64>,
}

impl Ewma {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
            None => x,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Threshold bookkeeping shared by imbalance and run bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    config: AdaptiveConfig,
    /// E[T]: expected ticks per bar.
    expected_ticks: Ewma,
    bars_closed: u64,
    /// Sum of the thresholds at which bars closed.
    threshold_sum: f64,
    current: f64,
}

impl AdaptiveThreshold {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            expected_ticks: Ewma::new(config.ewma_alpha),
            bars_closed: 0,
            threshold_sum: 0.0,
            current: config.initial_threshold,
            config,
        }
    }

    /// Threshold in force for the in-flight bar.
    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn expected_ticks(&self) -> Option<f64> {
        self.expected_ticks.value()
    }

    pub fn bars_closed(&self) -> u64 {
        self.bars_closed
    }

    /// Whether the seed period is still running.
    pub fn is_seeding(&self) -> bool {
        self.bars_closed < self.config.seed_bars as u64
    }

    /// Record a completed bar and derive the next threshold from the per-tick
    /// expectation the strategy has just updated.
    fn on_bar_close(&mut self, ticks: u64, expected_per_tick: f64) {
        self.bars_closed += 1;
        self.threshold_sum += self.current;
        let expected_ticks = self.expected_ticks.update(ticks as f64);

        if self.is_seeding() {
            return;
        }

        let avg = self.threshold_sum / self.bars_closed as f64;
        let raw = expected_ticks * expected_per_tick.abs();
        let raw = if raw.is_finite() { raw } else { avg };
        let ratio = self.config.max_threshold_ratio;
        let next = raw.clamp(avg / ratio, avg * ratio);
        if next != raw {
            debug!(raw, clamped = next, avg, "adaptive threshold clamped");
        }
        self.current = next;
    }

    fn kind_bar_type(&self, run: bool) -> BarType {
        if run {
            BarType::Run(self.config.kind)
        } else {
            BarType::Imbalance(self.config.kind)
        }
    }
}

/// Imbalance bar state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImbalanceBars {
    threshold: AdaptiveThreshold,
    /// E[theta_tick]: expected signed contribution per tick.
    expected_imbalance: Ewma,
    /// Running signed imbalance of the in-flight bar.
    theta: f64,
    bar: BarInProgress,
}

impl ImbalanceBars {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            expected_imbalance: Ewma::new(config.ewma_alpha),
            threshold: AdaptiveThreshold::new(config),
            theta: 0.0,
            bar: BarInProgress::default(),
        }
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn threshold(&self) -> &AdaptiveThreshold {
        &self.threshold
    }

    pub fn expected_imbalance(&self) -> Option<f64> {
        self.expected_imbalance.value()
    }
}

impl BarAccumulator for ImbalanceBars {
    fn accumulate(&mut self, tick: &Tick, side: Side) -> Option<Bar> {
        self.bar.add_tick(tick, side);
        self.theta += side.sign_f64() * self.threshold.config.kind.contribution(tick);

        let threshold = self.threshold.current();
        if self.theta.abs() < threshold {
            return None;
        }

        let bar = self.bar.to_bar(
            self.threshold.kind_bar_type(false),
            TriggerReason::Threshold,
            Some(threshold),
        );
        let ticks = self.bar.trade_count();
        let per_tick = self
            .expected_imbalance
            .update(self.theta / ticks as f64);
        self.threshold.on_bar_close(ticks, per_tick);
        debug!(
            ticks,
            theta = self.theta,
            next_threshold = self.threshold.current(),
            "imbalance bar closed"
        );
        self.reset();
        bar
    }

    fn flush(&mut self) -> Option<Bar> {
        let bar = self.bar.to_bar(
            self.threshold.kind_bar_type(false),
            TriggerReason::EndOfStream,
            Some(self.threshold.current()),
        );
        self.reset();
        bar
    }

    /// Drop the in-flight bar. Learned expectations are kept.
    fn reset(&mut self) {
        self.theta = 0.0;
        self.bar.clear();
    }
}

/// Run bar state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunBars {
    threshold: AdaptiveThreshold,
    /// P[buy] and P[sell] per tick.
    buy_prob: Ewma,
    sell_prob: Ewma,
    /// E[c | buy] and E[c | sell].
    buy_value: Ewma,
    sell_value: Ewma,
    buy_sum: f64,
    sell_sum: f64,
    buy_ticks: u64,
    sell_ticks: u64,
    bar: BarInProgress,
}

impl RunBars {
    pub fn new(config: AdaptiveConfig) -> Self {
        let alpha = config.ewma_alpha;
        Self {
            threshold: AdaptiveThreshold::new(config),
            buy_prob: Ewma::new(alpha),
            sell_prob: Ewma::new(alpha),
            buy_value: Ewma::new(alpha),
            sell_value: Ewma::new(alpha),
            buy_sum: 0.0,
            sell_sum: 0.0,
            buy_ticks: 0,
            sell_ticks: 0,
            bar: BarInProgress::default(),
        }
    }

    /// Larger one-sided run of the in-flight bar.
    pub fn theta(&self) -> f64 {
        self.buy_sum.max(self.sell_sum)
    }

    pub fn threshold(&self) -> &AdaptiveThreshold {
        &self.threshold
    }

    fn expected_per_tick(&mut self, ticks: u64) -> f64 {
        let n = ticks as f64;
        let p_buy = self.buy_prob.update(self.buy_ticks as f64 / n);
        let p_sell = self.sell_prob.update(self.sell_ticks as f64 / n);
        if self.buy_ticks > 0 {
            self.buy_value.update(self.buy_sum / self.buy_ticks as f64);
        }
        if self.sell_ticks > 0 {
            self.sell_value.update(self.sell_sum / self.sell_ticks as f64);
        }
        let buy = p_buy * self.buy_value.value().unwrap_or(0.0);
        let sell = p_sell * self.sell_value.value().unwrap_or(0.0);
        buy.max(sell)
    }
}

impl BarAccumulator for RunBars {
    fn accumulate(&mut self, tick: &Tick, side: Side) -> Option<Bar> {
        self.bar.add_tick(tick, side);
        let contribution = self.threshold.config.kind.contribution(tick);
        match side {
            Side::Buy => {
                self.buy_sum += contribution;
                self.buy_ticks += 1;
            }
            Side::Sell => {
                self.sell_sum += contribution;
                self.sell_ticks += 1;
            }
            Side::Unknown => {}
        }

        let threshold = self.threshold.current();
        let theta = self.theta();
        if theta < threshold {
            return None;
        }

        let bar = self.bar.to_bar(
            self.threshold.kind_bar_type(true),
            TriggerReason::Threshold,
            Some(threshold),
        );
        let ticks = self.bar.trade_count();
        let per_tick = self.expected_per_tick(ticks);
        self.threshold.on_bar_close(ticks, per_tick);
        debug!(
            ticks,
            theta,
            next_threshold = self.threshold.current(),
            "run bar closed"
        );
        self.reset();
        bar
    }

    fn flush(&mut self) -> Option<Bar> {
        let bar = self.bar.to_bar(
            self.threshold.kind_bar_type(true),
            TriggerReason::EndOfStream,
            Some(self.threshold.current()),
        );
        self.reset();
        bar
    }

    /// Drop the in-flight bar. Learned expectations are kept.
    fn reset(&mut self) {
        self.buy_sum = 0.0;
        self.sell_sum = 0.0;
        self.buy_ticks = 0;
        self.sell_ticks = 0;
        self.bar.clear();
    }
}
