//! Feature computation engine.
//!
//! Combines all feature components into a single per-tick update. Every value is a
//! function of the tick and the ticks before it; nothing reads ahead.

use crate::{
    impact::{AmihudIlliquidity, KyleLambda},
    intensity::TradeIntensity,
    order_flow::OrderFlowWindow,
    spread::SpreadTracker,
    vpin::Vpin,
};
use serde::{Deserialize, Serialize};
use tickbar_core::{
    FeatureColumn, FeatureConfig, FeatureValues, FeatureVector, PipelineConfig, Result, SignRule,
    Tick,
};
use tickbar_ingestion::TickClassifier;
use tracing::debug;

/// Per-tick microstructure feature extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractor {
    /// Independent side inference; bar construction keeps its own.
    classifier: TickClassifier,
    spread: SpreadTracker,
    vpin: Vpin,
    order_flow: OrderFlowWindow,
    intensity: TradeIntensity,
    kyle: KyleLambda,
    amihud: AmihudIlliquidity,
    ticks_processed: u64,
    /// Set once every column has been defined at least once.
    warmed_up: bool,
}

impl FeatureExtractor {
    /// Create an extractor; fails on invalid window sizes.
    pub fn new(config: &FeatureConfig, sign_rule: SignRule) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: TickClassifier::new(sign_rule),
            spread: SpreadTracker::new(
                config.spread_volatility_window,
                config.spread_percentile_window,
            ),
            vpin: Vpin::new(config.vpin_bucket_size, config.vpin_window),
            order_flow: OrderFlowWindow::new(config.order_flow_window),
            intensity: TradeIntensity::new(config.intensity_window_us),
            kyle: KyleLambda::new(config.kyle_window),
            amihud: AmihudIlliquidity::new(config.amihud_window),
            ticks_processed: 0,
            warmed_up: false,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(&config.features, config.sign_rule)
    }

    /// Process one validated tick and return the features observed at its timestamp.
    pub fn update(&mut self, tick: &Tick) -> FeatureVector {
        let side = self.classifier.classify(tick);
        let mut values = FeatureValues::default();

        // Quote-derived columns are observed only on quoted ticks.
        if let Some(snap) = self.spread.update(tick) {
            values.spread_absolute = Some(snap.absolute);
            values.mid_quote = Some(snap.mid);
            values.spread_relative = Some(snap.relative);
            values.spread_volatility = snap.volatility;
            values.spread_percentile = snap.percentile;
        }

        values.vpin = self.vpin.update(tick.volume, side);
        values.order_flow_imbalance = self.order_flow.add_trade(tick.volume, side);
        values.trade_intensity = self.intensity.update(tick.timestamp);
        values.kyle_lambda = self
            .kyle
            .update(tick.price, side.sign_f64() * tick.volume);
        values.amihud_illiquidity = self.amihud.update(tick.price, tick.volume);

        for column in FeatureColumn::ALL {
            if let Some(v) = values.get(column) {
                if !v.is_finite() {
                    values.set(column, None);
                }
            }
        }

        self.ticks_processed += 1;
        if !self.warmed_up && values.defined_count() == FeatureColumn::ALL.len() {
            self.warmed_up = true;
            debug!(
                ticks = self.ticks_processed,
                timestamp = tick.timestamp,
                "All feature windows filled"
            );
        }

        FeatureVector {
            timestamp: tick.timestamp,
            values,
        }
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    /// True once every feature has been defined on a single tick.
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.classifier.clear();
        self.spread.clear();
        self.vpin.clear();
        self.order_flow.clear();
        self.intensity.clear();
        self.kyle.clear();
        self.amihud.clear();
        self.ticks_processed = 0;
        self.warmed_up = false;
    }
}
