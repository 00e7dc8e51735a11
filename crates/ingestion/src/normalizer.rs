//! Tick validation and reordering.
//!
//! Raw ticks are validated and mapped onto the UTC microsecond time base, then
//! passed through a look-behind buffer that repairs small out-of-order arrivals.
//! The stream leaving the normalizer is non-decreasing in timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_core::{Error, MalformedTick, RawTick, RawTimestamp, Result, Tick, TimestampUs};
use tracing::warn;

/// Validate a raw tick and convert it to the internal representation.
pub fn normalize(raw: &RawTick) -> std::result::Result<Tick, MalformedTick> {
    let timestamp = to_micros(&raw.timestamp)?;

    if !raw.price.is_finite() {
        return Err(MalformedTick::NonFinite {
            field: "price",
            value: raw.price,
        });
    }
    if raw.price <= 0.0 {
        return Err(MalformedTick::NonPositivePrice(raw.price));
    }
    if !raw.volume.is_finite() {
        return Err(MalformedTick::NonFinite {
            field: "volume",
            value: raw.volume,
        });
    }
    if raw.volume < 0.0 {
        return Err(MalformedTick::NegativeVolume(raw.volume));
    }
    for (field, quote) in [("bid", raw.bid), ("ask", raw.ask)] {
        if let Some(value) = quote {
            if !value.is_finite() {
                return Err(MalformedTick::NonFinite { field, value });
            }
            if value <= 0.0 {
                return Err(MalformedTick::NonPositiveQuote { field, value });
            }
        }
    }
    if let (Some(bid), Some(ask)) = (raw.bid, raw.ask) {
        if bid > ask {
            return Err(MalformedTick::CrossedQuote { bid, ask });
        }
    }

    Ok(Tick {
        timestamp,
        price: raw.price,
        volume: raw.volume,
        bid: raw.bid,
        ask: raw.ask,
        side: raw.side,
    })
}

/// Map a source timestamp onto microseconds since the epoch (UTC).
///
/// Accepted instants are bounded to the range chrono can represent.
fn to_micros(ts: &RawTimestamp) -> std::result::Result<TimestampUs, MalformedTick> {
    let overflow = || MalformedTick::InvalidTimestamp(format!("{ts:?} out of range"));
    let micros = match ts {
        RawTimestamp::EpochSeconds(secs) => {
            let micros = (secs * 1e6).round();
            if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
                return Err(overflow());
            }
            micros as i64
        }
        RawTimestamp::EpochMillis(ms) => ms.checked_mul(1_000).ok_or_else(overflow)?,
        RawTimestamp::EpochMicros(us) => *us,
        RawTimestamp::EpochNanos(ns) => ns.div_euclid(1_000),
        RawTimestamp::Rfc3339(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_micros())
            .map_err(|e| MalformedTick::InvalidTimestamp(format!("{s:?}: {e}")))?,
    };
    let min = DateTime::<Utc>::MIN_UTC.timestamp_micros();
    let max = DateTime::<Utc>::MAX_UTC.timestamp_micros();
    if (min..=max).contains(&micros) {
        Ok(micros)
    } else {
        Err(overflow())
    }
}

/// Counters for normalizer decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizerStats {
    /// Ticks that passed validation and ordering.
    pub accepted: u64,
    /// Ticks rejected as malformed.
    pub rejected: u64,
    /// Ticks dropped for arriving beyond the tolerance window.
    pub dropped_late: u64,
    /// Accepted ticks that had to be moved ahead of buffered ones.
    pub reordered: u64,
}

/// Streaming normalizer with a look-behind reorder buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickNormalizer {
    /// Out-of-order tolerance in microseconds.
    tolerance_us: i64,
    /// Buffered ticks, sorted by timestamp (stable).
    buffer: VecDeque<Tick>,
    /// Newest timestamp accepted so far.
    max_seen: Option<TimestampUs>,
    stats: NormalizerStats,
}

impl TickNormalizer {
    /// Create a normalizer. A zero tolerance releases ticks immediately.
    pub fn new(tolerance_us: i64) -> Result<Self> {
        if tolerance_us < 0 {
            return Err(Error::config(format!(
                "out-of-order tolerance must be >= 0, got {tolerance_us}"
            )));
        }
        Ok(Self {
            tolerance_us,
            buffer: VecDeque::new(),
            max_seen: None,
            stats: NormalizerStats::default(),
        })
    }

    /// Ticks older than this are too late to be reordered.
    pub fn watermark(&self) -> Option<TimestampUs> {
        self.max_seen.map(|ts| ts.saturating_sub(self.tolerance_us))
    }

    /// Validate and buffer a raw tick, appending any ticks that became final to `out`.
    ///
    /// Malformed and late ticks are logged, counted and returned as non-fatal errors.
    pub fn push(&mut self, raw: &RawTick, out: &mut Vec<Tick>) -> Result<()> {
        let tick = match normalize(raw) {
            Ok(tick) => tick,
            Err(reason) => {
                self.stats.rejected += 1;
                warn!(?reason, timestamp = ?raw.timestamp, "rejected malformed tick");
                return Err(reason.into());
            }
        };
        self.push_tick(tick, out)
    }

    /// Order an already validated tick.
    pub fn push_tick(&mut self, tick: Tick, out: &mut Vec<Tick>) -> Result<()> {
        if let Some(watermark) = self.watermark() {
            if tick.timestamp < watermark {
                self.stats.dropped_late += 1;
                warn!(
                    timestamp = tick.timestamp,
                    watermark, "dropped tick beyond out-of-order tolerance"
                );
                return Err(Error::NonMonotonicTimestamp {
                    timestamp: tick.timestamp,
                    watermark,
                });
            }
        }

        // Insert after every buffered tick with timestamp <= this one.
        let pos = self
            .buffer
            .iter()
            .rposition(|t| t.timestamp <= tick.timestamp)
            .map_or(0, |i| i + 1);
        if pos < self.buffer.len() {
            self.stats.reordered += 1;
        }
        self.max_seen = Some(self.max_seen.map_or(tick.timestamp, |m| m.max(tick.timestamp)));
        self.buffer.insert(pos, tick);
        self.stats.accepted += 1;

        self.release(out);
        Ok(())
    }

    /// Move every buffered tick at or below the watermark to `out`.
    fn release(&mut self, out: &mut Vec<Tick>) {
        let Some(watermark) = self.watermark() else {
            return;
        };
        while self
            .buffer
            .front()
            .is_some_and(|t| t.timestamp <= watermark)
        {
            if let Some(tick) = self.buffer.pop_front() {
                out.push(tick);
            }
        }
    }

    /// Release all buffered ticks (end of stream).
    pub fn flush(&mut self, out: &mut Vec<Tick>) {
        out.extend(self.buffer.drain(..));
    }

    /// Number of ticks waiting in the reorder buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Get normalizer statistics.
    pub fn stats(&self) -> &NormalizerStats {
        &self.stats
    }
}
