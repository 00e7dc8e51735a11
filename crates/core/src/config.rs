//! Configuration structures for the tickbar system.
//!
//! Every parameter is explicit: none of these structs implement `Default`, so a
//! pipeline can only be built from a configuration that names all of its windows,
//! thresholds and policies.

use crate::error::{Error, Result};
use crate::types::{BarType, ImbalanceKind};
use serde::{Deserialize, Serialize};

/// Main configuration for one instrument's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bar sampling scheme.
    pub bar: BarSpec,
    /// Rolling feature windows.
    pub features: FeatureConfig,
    /// What to do with the partial bar at end of stream.
    pub end_of_stream: EndOfStreamPolicy,
    /// How far back (µs) a late tick may arrive and still be reordered.
    pub out_of_order_tolerance_us: i64,
    /// How ticks without a reported side are signed.
    pub sign_rule: SignRule,
}

impl PipelineConfig {
    /// Validate all sections. Fails fast on the first misconfiguration.
    pub fn validate(&self) -> Result<()> {
        self.bar.validate()?;
        self.features.validate()?;
        if self.out_of_order_tolerance_us < 0 {
            return Err(Error::config(format!(
                "out_of_order_tolerance_us must be >= 0, got {}",
                self.out_of_order_tolerance_us
            )));
        }
        Ok(())
    }
}

/// Policy for zero-tick time buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBucketPolicy {
    /// Emit nothing for empty buckets.
    Skip,
    /// Emit a flat zero-volume bar at the previous close.
    Emit,
}

/// Policy for the partial bar left over at end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfStreamPolicy {
    /// Emit it with `TriggerReason::EndOfStream`.
    Emit,
    /// Drop it.
    Discard,
}

/// How unsigned ticks get a trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRule {
    /// Reported side, then the tick rule.
    TickRule,
    /// Reported side, then price against the quote, then the tick rule.
    QuoteThenTick,
}

/// Bootstrap and adaptation parameters for imbalance and run bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Quantity accumulated per tick.
    pub kind: ImbalanceKind,
    /// Fixed threshold used during the seed period.
    pub initial_threshold: f64,
    /// Number of bars closed on `initial_threshold` before the EWMAs take over.
    pub seed_bars: u32,
    /// EWMA weight of the newest bar, in (0, 1].
    pub ewma_alpha: f64,
    /// Adaptive thresholds are clamped to `[avg / ratio, avg * ratio]`.
    pub max_threshold_ratio: f64,
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_threshold.is_finite() && self.initial_threshold > 0.0) {
            return Err(Error::config(format!(
                "initial_threshold must be positive, got {}",
                self.initial_threshold
            )));
        }
        if self.seed_bars == 0 {
            return Err(Error::config("seed_bars must be at least 1"));
        }
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return Err(Error::config(format!(
                "ewma_alpha must be in (0, 1], got {}",
                self.ewma_alpha
            )));
        }
        if !(self.max_threshold_ratio.is_finite() && self.max_threshold_ratio >= 1.0) {
            return Err(Error::config(format!(
                "max_threshold_ratio must be >= 1, got {}",
                self.max_threshold_ratio
            )));
        }
        Ok(())
    }
}

/// Bar sampling scheme and its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarSpec {
    /// Fixed-duration buckets aligned to the epoch.
    Time {
        duration_us: i64,
        empty_buckets: EmptyBucketPolicy,
    },
    /// Close after N ticks.
    Tick { ticks: u32 },
    /// Close once cumulative volume reaches the threshold.
    Volume { threshold: f64 },
    /// Close once cumulative price*volume reaches the threshold.
    Dollar { threshold: f64 },
    /// Adaptive signed-imbalance bars.
    Imbalance(AdaptiveConfig),
    /// Adaptive run bars.
    Run(AdaptiveConfig),
}

impl BarSpec {
    /// Time bars from a chrono duration.
    pub fn time(duration: chrono::Duration, empty_buckets: EmptyBucketPolicy) -> Result<Self> {
        let duration_us = duration
            .num_microseconds()
            .ok_or_else(|| Error::config("time bar duration overflows microseconds"))?;
        Ok(BarSpec::Time {
            duration_us,
            empty_buckets,
        })
    }

    /// Bar type produced by this spec.
    pub fn bar_type(&self) -> BarType {
        match self {
            BarSpec::Time { .. } => BarType::Time,
            BarSpec::Tick { .. } => BarType::Tick,
            BarSpec::Volume { .. } => BarType::Volume,
            BarSpec::Dollar { .. } => BarType::Dollar,
            BarSpec::Imbalance(cfg) => BarType::Imbalance(cfg.kind),
            BarSpec::Run(cfg) => BarType::Run(cfg.kind),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            BarSpec::Time { duration_us, .. } if *duration_us <= 0 => Err(Error::config(
                format!("time bar duration must be positive, got {duration_us}us"),
            )),
            BarSpec::Tick { ticks: 0 } => Err(Error::config("tick bar count must be positive")),
            BarSpec::Volume { threshold } | BarSpec::Dollar { threshold }
                if !(threshold.is_finite() && *threshold > 0.0) =>
            {
                Err(Error::config(format!(
                    "{:?} bar threshold must be positive, got {threshold}",
                    self.bar_type()
                )))
            }
            BarSpec::Imbalance(cfg) | BarSpec::Run(cfg) => cfg.validate(),
            _ => Ok(()),
        }
    }
}

/// Rolling window sizes for the feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Quoted ticks in the spread standard deviation window.
    pub spread_volatility_window: usize,
    /// Quoted ticks in the spread percentile window.
    pub spread_percentile_window: usize,
    /// Volume per VPIN bucket.
    pub vpin_bucket_size: f64,
    /// Completed buckets averaged by VPIN.
    pub vpin_window: usize,
    /// Ticks in the order flow imbalance window.
    pub order_flow_window: usize,
    /// Trailing time window (µs) for trade intensity.
    pub intensity_window_us: i64,
    /// Ticks in the Kyle's lambda regression.
    pub kyle_window: usize,
    /// Ticks in the Amihud illiquidity mean.
    pub amihud_window: usize,
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        let min_sizes = [
            ("spread_volatility_window", self.spread_volatility_window, 2),
            ("spread_percentile_window", self.spread_percentile_window, 1),
            ("vpin_window", self.vpin_window, 1),
            ("order_flow_window", self.order_flow_window, 1),
            ("kyle_window", self.kyle_window, 2),
            ("amihud_window", self.amihud_window, 1),
        ];
        for (name, value, min) in min_sizes {
            if value < min {
                return Err(Error::config(format!(
                    "{name} must be at least {min}, got {value}"
                )));
            }
        }
        if !(self.vpin_bucket_size.is_finite() && self.vpin_bucket_size > 0.0) {
            return Err(Error::config(format!(
                "vpin_bucket_size must be positive, got {}",
                self.vpin_bucket_size
            )));
        }
        if self.intensity_window_us <= 0 {
            return Err(Error::config(format!(
                "intensity_window_us must be positive, got {}",
                self.intensity_window_us
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureConfig {
        FeatureConfig {
            spread_volatility_window: 20,
            spread_percentile_window: 100,
            vpin_bucket_size: 50.0,
            vpin_window: 10,
            order_flow_window: 50,
            intensity_window_us: 60_000_000,
            kyle_window: 50,
            amihud_window: 50,
        }
    }

    fn adaptive() -> AdaptiveConfig {
        AdaptiveConfig {
            kind: ImbalanceKind::Tick,
            initial_threshold: 20.0,
            seed_bars: 3,
            ewma_alpha: 0.1,
            max_threshold_ratio: 10.0,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = PipelineConfig {
            bar: BarSpec::Volume { threshold: 100.0 },
            features: features(),
            end_of_stream: EndOfStreamPolicy::Emit,
            out_of_order_tolerance_us: 1_000,
            sign_rule: SignRule::TickRule,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_thresholds_rejected() {
        assert!(BarSpec::Volume { threshold: 0.0 }.validate().is_err());
        assert!(BarSpec::Dollar { threshold: -5.0 }.validate().is_err());
        assert!(BarSpec::Volume { threshold: f64::NAN }.validate().is_err());
        assert!(BarSpec::Tick { ticks: 0 }.validate().is_err());
        assert!(BarSpec::Time {
            duration_us: 0,
            empty_buckets: EmptyBucketPolicy::Skip
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_adaptive_validation() {
        assert!(BarSpec::Imbalance(adaptive()).validate().is_ok());

        let mut cfg = adaptive();
        cfg.ewma_alpha = 0.0;
        assert!(BarSpec::Run(cfg).validate().is_err());

        let mut cfg = adaptive();
        cfg.seed_bars = 0;
        assert!(BarSpec::Imbalance(cfg).validate().is_err());

        let mut cfg = adaptive();
        cfg.max_threshold_ratio = 0.5;
        assert!(BarSpec::Imbalance(cfg).validate().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut cfg = features();
        cfg.kyle_window = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = features();
        cfg.spread_volatility_window = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_time_from_chrono() {
        let spec = BarSpec::time(chrono::Duration::minutes(5), EmptyBucketPolicy::Emit).unwrap();
        assert_eq!(
            spec,
            BarSpec::Time {
                duration_us: 300_000_000,
                empty_buckets: EmptyBucketPolicy::Emit
            }
        );
        assert_eq!(spec.bar_type(), BarType::Time);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "bar": {"imbalance": {"kind": "volume", "initial_threshold": 500.0,
                     "seed_bars": 5, "ewma_alpha": 0.05, "max_threshold_ratio": 4.0}},
            "features": {"spread_volatility_window": 20, "spread_percentile_window": 100,
                         "vpin_bucket_size": 50.0, "vpin_window": 10, "order_flow_window": 50,
                         "intensity_window_us": 60000000, "kyle_window": 50, "amihud_window": 50},
            "end_of_stream": "discard",
            "out_of_order_tolerance_us": 0,
            "sign_rule": "quote_then_tick"
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.bar.bar_type(), BarType::Imbalance(ImbalanceKind::Volume));
    }
}
