//! Trade arrival rate.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_core::{TimestampUs, MICROS_PER_SECOND};

/// Ticks per second over a trailing time window `(t - window, t]`.
///
/// Undefined until the stream spans at least one full window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntensity {
    window_us: i64,
    arrivals: VecDeque<TimestampUs>,
    first_seen: Option<TimestampUs>,
}

impl TradeIntensity {
    pub fn new(window_us: i64) -> Self {
        Self {
            window_us,
            arrivals: VecDeque::new(),
            first_seen: None,
        }
    }

    pub fn update(&mut self, timestamp: TimestampUs) -> Option<f64> {
        let first = *self.first_seen.get_or_insert(timestamp);
        self.arrivals.push_back(timestamp);
        let horizon = timestamp.saturating_sub(self.window_us);
        while self.arrivals.front().is_some_and(|&t| t <= horizon) {
            self.arrivals.pop_front();
        }
        if timestamp.saturating_sub(first) < self.window_us {
            return None;
        }
        let seconds = self.window_us as f64 / MICROS_PER_SECOND as f64;
        Some(self.arrivals.len() as f64 / seconds)
    }

    pub fn clear(&mut self) {
        self.arrivals.clear();
        self.first_seen = None;
    }
}
