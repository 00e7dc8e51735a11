//! Rolling dispersion.
//!
//! Sample standard deviation over a fixed-length window, maintained with
//! Welford's update and its inverse on eviction.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rolling sample standard deviation calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingStd {
    /// Window size in observations.
    window: usize,
    /// Observations currently in the window.
    values: VecDeque<f64>,
    /// Running mean of the window.
    mean: f64,
    /// Running sum of squared deviations from the mean.
    m2: f64,
}

impl RollingStd {
    /// Create a new rolling calculator.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window + 1),
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Add an observation.
    ///
    /// Returns the current standard deviation once the window is full.
    pub fn add(&mut self, value: f64) -> Option<f64> {
        if self.values.len() >= self.window {
            if let Some(old) = self.values.pop_front() {
                self.remove(old);
            }
        }
        self.values.push_back(value);
        let n = self.values.len() as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);
        self.std()
    }

    fn remove(&mut self, value: f64) {
        // `values` already excludes the evicted observation.
        let n = self.values.len() as f64;
        if n == 0.0 {
            self.mean = 0.0;
            self.m2 = 0.0;
            return;
        }
        let mean = (self.mean * (n + 1.0) - value) / n;
        self.m2 -= (value - self.mean) * (value - mean);
        self.mean = mean;
    }

    /// Sample standard deviation, defined once the window is full.
    pub fn std(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 || !self.is_ready() {
            return None;
        }
        Some((self.m2.max(0.0) / (n - 1) as f64).sqrt())
    }

    pub fn mean(&self) -> Option<f64> {
        (!self.values.is_empty()).then_some(self.mean)
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.window
    }

    /// Get the number of observations.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.values.clear();
        self.mean = 0.0;
        self.m2 = 0.0;
    }
}
