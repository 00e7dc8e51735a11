//! Core data types for the tickbar system.

use serde::{Deserialize, Serialize};

/// Timestamp in microseconds since Unix epoch (UTC).
pub type TimestampUs = i64;

/// Microseconds per second.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Floor a timestamp to the start of its epoch-aligned bucket.
#[inline]
pub fn bucket_start(ts_us: TimestampUs, width_us: i64) -> TimestampUs {
    ts_us.div_euclid(width_us) * width_us
}

/// Timestamp as delivered by a data source, before normalization.
///
/// String timestamps must carry an explicit UTC offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawTimestamp {
    EpochSeconds(f64),
    EpochMillis(i64),
    EpochMicros(i64),
    EpochNanos(i64),
    Rfc3339(String),
}

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum Side {
    /// Buyer-initiated.
    Buy = 1,
    /// Seller-initiated.
    Sell = -1,
    /// Not determinable.
    Unknown = 0,
}

impl Side {
    /// Get the sign as i8.
    #[inline]
    pub fn sign(self) -> i8 {
        self as i8
    }

    /// Get the sign as f64.
    #[inline]
    pub fn sign_f64(self) -> f64 {
        self.sign() as f64
    }
}

/// A trade record as received from the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    pub timestamp: RawTimestamp,
    pub price: f64,
    pub volume: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub side: Option<Side>,
}

/// A validated trade on the UTC microsecond time base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp in microseconds.
    pub timestamp: TimestampUs,
    /// Trade price (> 0).
    pub price: f64,
    /// Trade size (>= 0).
    pub volume: f64,
    /// Prevailing best bid.
    pub bid: Option<f64>,
    /// Prevailing best ask.
    pub ask: Option<f64>,
    /// Aggressor side if reported by the source.
    pub side: Option<Side>,
}

impl Tick {
    /// Price times volume.
    #[inline]
    pub fn dollar_value(&self) -> f64 {
        self.price * self.volume
    }

    /// Bid/ask pair when both sides are quoted.
    #[inline]
    pub fn quote(&self) -> Option<(f64, f64)> {
        Some((self.bid?, self.ask?))
    }

    /// Calculate spread.
    #[inline]
    pub fn spread(&self) -> Option<f64> {
        self.quote().map(|(bid, ask)| ask - bid)
    }

    /// Calculate mid price.
    #[inline]
    pub fn mid(&self) -> Option<f64> {
        self.quote().map(|(bid, ask)| (bid + ask) / 2.0)
    }
}

/// Per-tick quantity accumulated by imbalance and run bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImbalanceKind {
    /// One unit per tick.
    Tick,
    /// Trade volume.
    Volume,
    /// Price times volume.
    Dollar,
}

impl ImbalanceKind {
    /// Unsigned contribution of a tick.
    #[inline]
    pub fn contribution(self, tick: &Tick) -> f64 {
        match self {
            ImbalanceKind::Tick => 1.0,
            ImbalanceKind::Volume => tick.volume,
            ImbalanceKind::Dollar => tick.dollar_value(),
        }
    }
}

/// Sampling scheme that produced a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarType {
    Time,
    Tick,
    Volume,
    Dollar,
    Imbalance(ImbalanceKind),
    Run(ImbalanceKind),
}

/// Why a bar was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Count, volume, dollar or adaptive threshold reached.
    Threshold,
    /// A tick arrived in a later time bucket.
    TimeBoundary,
    /// Time bucket without any ticks.
    EmptyBucket,
    /// Partial bar flushed at end of stream.
    EndOfStream,
}

/// A completed bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub bar_type: BarType,
    /// First tick (or bucket start for time bars), microseconds.
    pub timestamp_start: TimestampUs,
    /// Last tick (or inclusive bucket end for time bars), microseconds.
    pub timestamp_end: TimestampUs,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub dollar_value: f64,
    /// Volume-weighted average price, None for zero-volume bars.
    pub vwap: Option<f64>,
    /// Volume of buyer-initiated ticks.
    pub buy_volume: f64,
    /// Volume of seller-initiated ticks.
    pub sell_volume: f64,
    pub trade_count: u64,
    pub trigger_reason: TriggerReason,
    /// Threshold in force when the bar closed (None for time bars).
    pub threshold: Option<f64>,
}

impl Bar {
    /// Check the OHLC and time-range invariants.
    pub fn is_consistent(&self) -> bool {
        self.timestamp_start <= self.timestamp_end
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
    }
}

/// Feature columns attached to each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    SpreadAbsolute,
    MidQuote,
    SpreadRelative,
    SpreadVolatility,
    SpreadPercentile,
    Vpin,
    OrderFlowImbalance,
    TradeIntensity,
    KyleLambda,
    AmihudIlliquidity,
}

impl FeatureColumn {
    /// All columns in output order.
    pub const ALL: [FeatureColumn; 10] = [
        FeatureColumn::SpreadAbsolute,
        FeatureColumn::MidQuote,
        FeatureColumn::SpreadRelative,
        FeatureColumn::SpreadVolatility,
        FeatureColumn::SpreadPercentile,
        FeatureColumn::Vpin,
        FeatureColumn::OrderFlowImbalance,
        FeatureColumn::TradeIntensity,
        FeatureColumn::KyleLambda,
        FeatureColumn::AmihudIlliquidity,
    ];
}

/// The ten feature values. `None` marks an undefined value, never zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureValues {
    pub spread_absolute: Option<f64>,
    pub mid_quote: Option<f64>,
    pub spread_relative: Option<f64>,
    pub spread_volatility: Option<f64>,
    pub spread_percentile: Option<f64>,
    pub vpin: Option<f64>,
    pub order_flow_imbalance: Option<f64>,
    pub trade_intensity: Option<f64>,
    pub kyle_lambda: Option<f64>,
    pub amihud_illiquidity: Option<f64>,
}

impl FeatureValues {
    pub fn get(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::SpreadAbsolute => self.spread_absolute,
            FeatureColumn::MidQuote => self.mid_quote,
            FeatureColumn::SpreadRelative => self.spread_relative,
            FeatureColumn::SpreadVolatility => self.spread_volatility,
            FeatureColumn::SpreadPercentile => self.spread_percentile,
            FeatureColumn::Vpin => self.vpin,
            FeatureColumn::OrderFlowImbalance => self.order_flow_imbalance,
            FeatureColumn::TradeIntensity => self.trade_intensity,
            FeatureColumn::KyleLambda => self.kyle_lambda,
            FeatureColumn::AmihudIlliquidity => self.amihud_illiquidity,
        }
    }

    pub fn set(&mut self, column: FeatureColumn, value: Option<f64>) {
        let slot = match column {
            FeatureColumn::SpreadAbsolute => &mut self.spread_absolute,
            FeatureColumn::MidQuote => &mut self.mid_quote,
            FeatureColumn::SpreadRelative => &mut self.spread_relative,
            FeatureColumn::SpreadVolatility => &mut self.spread_volatility,
            FeatureColumn::SpreadPercentile => &mut self.spread_percentile,
            FeatureColumn::Vpin => &mut self.vpin,
            FeatureColumn::OrderFlowImbalance => &mut self.order_flow_imbalance,
            FeatureColumn::TradeIntensity => &mut self.trade_intensity,
            FeatureColumn::KyleLambda => &mut self.kyle_lambda,
            FeatureColumn::AmihudIlliquidity => &mut self.amihud_illiquidity,
        };
        *slot = value;
    }

    /// Number of defined columns.
    pub fn defined_count(&self) -> usize {
        FeatureColumn::ALL
            .iter()
            .filter(|&&c| self.get(c).is_some())
            .count()
    }
}

/// Feature values observed at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub timestamp: TimestampUs,
    #[serde(flatten)]
    pub values: FeatureValues,
}

/// One bar joined with the latest feature values known at its close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarFeatureRow {
    #[serde(flatten)]
    pub bar: Bar,
    /// Timestamp of the most recent feature vector consumed; never after `bar.timestamp_end`.
    pub feature_timestamp: Option<TimestampUs>,
    #[serde(flatten)]
    pub features: FeatureValues,
}
