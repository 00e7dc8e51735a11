//! Error types for the tickbar system.

use crate::types::TimestampUs;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a raw tick is rejected by the normalizer.
///
/// Rejection is never fatal: the tick is logged, counted and skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedTick {
    /// Price is zero or negative.
    #[error("non-positive price: {0}")]
    NonPositivePrice(f64),

    /// Volume is negative.
    #[error("negative volume: {0}")]
    NegativeVolume(f64),

    /// A numeric field is NaN or infinite.
    #[error("non-finite {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    /// Bid or ask quote is zero or negative.
    #[error("non-positive {field} quote: {value}")]
    NonPositiveQuote { field: &'static str, value: f64 },

    /// Crossed quote.
    #[error("bid {bid} above ask {ask}")]
    CrossedQuote { bid: f64, ask: f64 },

    /// Timestamp could not be mapped onto the UTC microsecond time base.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Main error type for the tickbar system.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid bar or feature configuration. Raised before any tick is processed.
    #[error("Threshold misconfiguration: {0}")]
    ThresholdMisconfiguration(String),

    /// Tick failed validation.
    #[error("Malformed tick: {0}")]
    MalformedTick(#[from] MalformedTick),

    /// Tick arrived later than the out-of-order tolerance allows.
    #[error("Non-monotonic timestamp: {timestamp} is older than watermark {watermark}")]
    NonMonotonicTimestamp {
        timestamp: TimestampUs,
        watermark: TimestampUs,
    },

    /// Checkpoint does not match the configuration it is restored under.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Multi-instrument batch could not be scheduled.
    #[error("Batch error: {0}")]
    Batch(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::ThresholdMisconfiguration(msg.into())
    }

    /// Create a checkpoint error.
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Error::Checkpoint(msg.into())
    }

    /// Whether the error aborts processing, as opposed to dropping a single tick.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::MalformedTick(_) | Error::NonMonotonicTimestamp { .. }
        )
    }
}
