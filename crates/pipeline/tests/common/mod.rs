#![allow(dead_code)]

use std::sync::Once;
use tickbar_core::{
    AdaptiveConfig, BarSpec, EmptyBucketPolicy, EndOfStreamPolicy, FeatureConfig, ImbalanceKind,
    PipelineConfig, RawTick, RawTimestamp, Side, SignRule,
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn feature_config() -> FeatureConfig {
    FeatureConfig {
        spread_volatility_window: 20,
        spread_percentile_window: 50,
        vpin_bucket_size: 50.0,
        vpin_window: 5,
        order_flow_window: 30,
        intensity_window_us: 2_000_000,
        kyle_window: 30,
        amihud_window: 30,
    }
}

pub fn config(bar: BarSpec) -> PipelineConfig {
    PipelineConfig {
        bar,
        features: feature_config(),
        end_of_stream: EndOfStreamPolicy::Emit,
        out_of_order_tolerance_us: 0,
        sign_rule: SignRule::QuoteThenTick,
    }
}

pub fn adaptive(kind: ImbalanceKind, initial_threshold: f64) -> AdaptiveConfig {
    AdaptiveConfig {
        kind,
        initial_threshold,
        seed_bars: 5,
        ewma_alpha: 0.1,
        max_threshold_ratio: 4.0,
    }
}

pub fn all_specs() -> Vec<BarSpec> {
    vec![
        BarSpec::Time {
            duration_us: 500_000,
            empty_buckets: EmptyBucketPolicy::Emit,
        },
        BarSpec::Time {
            duration_us: 500_000,
            empty_buckets: EmptyBucketPolicy::Skip,
        },
        BarSpec::Tick { ticks: 25 },
        BarSpec::Volume { threshold: 120.0 },
        BarSpec::Dollar { threshold: 12_000.0 },
        BarSpec::Imbalance(adaptive(ImbalanceKind::Tick, 8.0)),
        BarSpec::Imbalance(adaptive(ImbalanceKind::Volume, 40.0)),
        BarSpec::Run(adaptive(ImbalanceKind::Tick, 15.0)),
        BarSpec::Run(adaptive(ImbalanceKind::Dollar, 3_000.0)),
    ]
}

pub fn raw_tick(ts: i64, price: f64, volume: f64, bid: Option<f64>, ask: Option<f64>) -> RawTick {
    RawTick {
        timestamp: RawTimestamp::EpochMicros(ts),
        price,
        volume,
        bid,
        ask,
        side: None,
    }
}

/// splitmix64 stream for reproducible synthetic data.
pub struct SplitMix(u64);

impl SplitMix {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Random walk around 100 with quotes, mostly ordered timestamps and a mix of
/// reported and unreported sides.
pub fn synthetic_stream(seed: u64, n: usize) -> Vec<RawTick> {
    let mut rng = SplitMix::new(seed);
    let mut ts = 1_700_000_000_000_000i64;
    let mut mid = 100.0f64;
    (0..n)
        .map(|_| {
            ts += (rng.next_f64() * 40_000.0) as i64;
            if rng.next_f64() < 0.01 {
                // occasional quiet period spanning several time buckets
                ts += 2_000_000;
            }
            mid = (mid + (rng.next_f64() - 0.5) * 0.1).max(1.0);
            let half_spread = 0.01 + rng.next_f64() * 0.02;
            let bid = mid - half_spread;
            let ask = mid + half_spread;
            let u = rng.next_f64();
            let price = if u < 0.4 {
                ask
            } else if u < 0.8 {
                bid
            } else {
                mid
            };
            let volume = 1.0 + (rng.next_f64() * 9.0).floor();
            let mut tick = raw_tick(ts, price, volume, Some(bid), Some(ask));
            if rng.next_f64() < 0.2 {
                tick.side = Some(if rng.next_f64() < 0.5 { Side::Buy } else { Side::Sell });
            }
            if rng.next_f64() < 0.1 {
                tick.bid = None;
                tick.ask = None;
            }
            tick
        })
        .collect()
}
