//! Price impact estimators.
//!
//! - [`KyleLambda`]: OLS slope of tick price change on signed volume.
//! - [`AmihudIlliquidity`]: mean absolute return per unit of dollar volume.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rebuild running moments from the window once they have shrunk by this factor
/// since the last rebuild.
const COLLAPSE_RATIO: f64 = 1e-4;

/// Centered means, second moments and co-moment of `(x, y)` pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CoMoments {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    m2_x: f64,
    m2_y: f64,
    c_xy: f64,
}

impl CoMoments {
    fn from_points<'a>(points: impl IntoIterator<Item = &'a (f64, f64)>) -> Self {
        let mut moments = Self::default();
        for &(x, y) in points {
            moments.add(x, y);
        }
        moments
    }

    fn add(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.mean_x += dx / n;
        self.mean_y += dy / n;
        self.m2_x += dx * (x - self.mean_x);
        self.m2_y += dy * (y - self.mean_y);
        self.c_xy += dx * (y - self.mean_y);
    }

    fn remove(&mut self, x: f64, y: f64) {
        if self.n <= 1 {
            *self = Self::default();
            return;
        }
        self.n -= 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.mean_x -= dx / n;
        self.mean_y -= dy / n;
        self.m2_x -= dx * (x - self.mean_x);
        self.m2_y -= dy * (y - self.mean_y);
        self.c_xy -= dx * (y - self.mean_y);
    }
}

/// Rolling regression `Δp = λ · signed_volume + c` over the last `window` ticks.
///
/// Moments are updated incrementally and rebuilt from the window every `window`
/// evictions, or sooner when they collapse relative to their recent peak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KyleLambda {
    window: usize,
    prev_price: Option<f64>,
    /// (signed volume, price change) pairs.
    points: VecDeque<(f64, f64)>,
    moments: CoMoments,
    /// Largest `m2_x` / `m2_y` since the last rebuild.
    peak: (f64, f64),
    evictions: usize,
}

impl KyleLambda {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_price: None,
            points: VecDeque::with_capacity(window + 1),
            moments: CoMoments::default(),
            peak: (0.0, 0.0),
            evictions: 0,
        }
    }

    /// Add a trade. The first trade only seeds the previous price.
    pub fn update(&mut self, price: f64, signed_volume: f64) -> Option<f64> {
        if let Some(prev) = self.prev_price.replace(price) {
            let dp = price - prev;
            self.push(signed_volume, dp);
        }
        self.lambda()
    }

    fn push(&mut self, x: f64, y: f64) {
        self.points.push_back((x, y));
        self.moments.add(x, y);
        self.track_peak();
        if self.points.len() > self.window {
            if let Some((ox, oy)) = self.points.pop_front() {
                self.moments.remove(ox, oy);
                self.evictions += 1;
                let (peak_x, peak_y) = self.peak;
                if self.evictions >= self.window
                    || self.moments.m2_x < peak_x * COLLAPSE_RATIO
                    || self.moments.m2_y < peak_y * COLLAPSE_RATIO
                {
                    self.rebuild();
                }
            }
        }
    }

    fn track_peak(&mut self) {
        self.peak.0 = self.peak.0.max(self.moments.m2_x);
        self.peak.1 = self.peak.1.max(self.moments.m2_y);
    }

    fn rebuild(&mut self) {
        self.moments = CoMoments::from_points(&self.points);
        self.peak = (self.moments.m2_x, self.moments.m2_y);
        self.evictions = 0;
    }

    /// Slope estimate; undefined while the window is short or signed volume is constant.
    pub fn lambda(&self) -> Option<f64> {
        if self.points.len() < self.window {
            return None;
        }
        let m = &self.moments;
        let scale = m.m2_x + m.n as f64 * m.mean_x * m.mean_x;
        if m.m2_x <= 1e-12 * scale.max(f64::MIN_POSITIVE) {
            return None;
        }
        let lambda = m.c_xy / m.m2_x;
        lambda.is_finite().then_some(lambda)
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.window);
    }
}

/// Rolling Amihud illiquidity ratio `|r| / (price · volume)`.
///
/// Ticks with zero dollar volume contribute no observation but still advance the
/// reference price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmihudIlliquidity {
    window: usize,
    prev_price: Option<f64>,
    ratios: VecDeque<f64>,
    sum: f64,
    /// Largest `sum` since the last rebuild.
    peak: f64,
    evictions: usize,
}

impl AmihudIlliquidity {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev_price: None,
            ratios: VecDeque::with_capacity(window + 1),
            sum: 0.0,
            peak: 0.0,
            evictions: 0,
        }
    }

    pub fn update(&mut self, price: f64, volume: f64) -> Option<f64> {
        if let Some(prev) = self.prev_price.replace(price) {
            let dollar_volume = price * volume;
            if dollar_volume > 0.0 {
                let ratio = (price / prev - 1.0).abs() / dollar_volume;
                if ratio.is_finite() {
                    self.push(ratio);
                }
            }
        }
        self.value()
    }

    fn push(&mut self, ratio: f64) {
        self.ratios.push_back(ratio);
        self.sum += ratio;
        self.peak = self.peak.max(self.sum);
        if self.ratios.len() > self.window {
            if let Some(old) = self.ratios.pop_front() {
                self.sum -= old;
                self.evictions += 1;
                if self.evictions >= self.window || self.sum < self.peak * COLLAPSE_RATIO {
                    self.sum = self.ratios.iter().sum();
                    self.peak = self.sum;
                    self.evictions = 0;
                }
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        if self.ratios.len() < self.window {
            return None;
        }
        Some((self.sum / self.ratios.len() as f64).max(0.0))
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.window);
    }
}
