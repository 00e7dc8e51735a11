//! Volume-synchronized probability of informed trading.
//!
//! Signed volume is poured into equal-volume buckets. A tick larger than the room
//! left in the current bucket spills into the following buckets. VPIN is the mean
//! of `|buy - sell| / bucket_size` over the most recent completed buckets.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_core::Side;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vpin {
    bucket_size: f64,
    window: usize,
    /// Buy volume in the open bucket.
    buy: f64,
    /// Sell volume in the open bucket.
    sell: f64,
    /// Total volume in the open bucket.
    filled: f64,
    /// Order imbalance of completed buckets, oldest first.
    completed: VecDeque<f64>,
    completed_sum: f64,
    buckets_total: u64,
}

impl Vpin {
    pub fn new(bucket_size: f64, window: usize) -> Self {
        Self {
            bucket_size,
            window,
            buy: 0.0,
            sell: 0.0,
            filled: 0.0,
            completed: VecDeque::with_capacity(window + 1),
            completed_sum: 0.0,
            buckets_total: 0,
        }
    }

    /// Add a classified trade and return the current estimate.
    ///
    /// Volume of unknown side is split evenly between buy and sell. Buckets that a
    /// single trade fills on its own all carry the same imbalance, so at most
    /// `window` of them are materialized.
    pub fn update(&mut self, volume: f64, side: Side) -> Option<f64> {
        if volume.is_nan() || volume <= 0.0 {
            return self.value();
        }
        let room = self.bucket_size - self.filled;
        if volume < room {
            self.pour(volume, side);
            self.filled += volume;
            return self.value();
        }

        self.pour(room, side);
        self.complete_bucket();
        let rest = volume - room;
        let full = (rest / self.bucket_size).floor();
        let leftover = (rest - full * self.bucket_size).clamp(0.0, self.bucket_size);
        let (full, leftover) = if leftover >= self.bucket_size {
            (full + 1.0, 0.0)
        } else {
            (full, leftover)
        };
        if full >= 1.0 {
            let imbalance = match side {
                Side::Unknown => 0.0,
                Side::Buy | Side::Sell => 1.0,
            };
            for _ in 0..(full.min(self.window as f64) as usize) {
                self.completed.push_back(imbalance);
            }
            self.completed.drain(..self.completed.len().saturating_sub(self.window));
            // Saturating cast.
            self.buckets_total = self.buckets_total.saturating_add(full as u64);
        }
        self.completed_sum = self.completed.iter().sum();
        if leftover > 0.0 {
            self.pour(leftover, side);
            self.filled = leftover;
        }
        self.value()
    }

    fn pour(&mut self, amount: f64, side: Side) {
        match side {
            Side::Buy => self.buy += amount,
            Side::Sell => self.sell += amount,
            Side::Unknown => {
                self.buy += amount / 2.0;
                self.sell += amount / 2.0;
            }
        }
    }

    fn complete_bucket(&mut self) {
        let imbalance = (self.buy - self.sell).abs() / self.bucket_size;
        self.completed.push_back(imbalance);
        if self.completed.len() > self.window {
            self.completed.pop_front();
        }
        self.buy = 0.0;
        self.sell = 0.0;
        self.filled = 0.0;
        self.buckets_total += 1;
    }

    /// Defined once `window` buckets have completed.
    pub fn value(&self) -> Option<f64> {
        if self.completed.len() < self.window {
            return None;
        }
        Some((self.completed_sum / self.window as f64).clamp(0.0, 1.0))
    }

    /// Buckets completed since construction.
    pub fn buckets_completed(&self) -> u64 {
        self.buckets_total
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.bucket_size, self.window);
    }
}
