//! Fixed-duration bars aligned to the epoch.

use super::accumulator::{flat_bar, BarInProgress};
use super::BarAccumulator;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_core::{
    bucket_start, Bar, BarType, EmptyBucketPolicy, Side, Tick, TimestampUs, TriggerReason,
};

/// Time bar state machine.
///
/// A bar covers `[bucket, bucket + duration - 1]` in microseconds and closes when the
/// first tick of a later bucket arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBars {
    duration_us: i64,
    empty_buckets: EmptyBucketPolicy,
    current_bucket: Option<TimestampUs>,
    bar: BarInProgress,
    /// Flat bars for skipped buckets, queued behind the bar that closed.
    gap_bars: VecDeque<Bar>,
}

impl TimeBars {
    pub fn new(duration_us: i64, empty_buckets: EmptyBucketPolicy) -> Self {
        Self {
            duration_us,
            empty_buckets,
            current_bucket: None,
            bar: BarInProgress::default(),
            gap_bars: VecDeque::new(),
        }
    }

    fn bucket_end(&self, bucket: TimestampUs) -> TimestampUs {
        bucket.saturating_add(self.duration_us - 1)
    }

    fn close_bucket(&mut self, bucket: TimestampUs) -> Option<Bar> {
        let bar = self.bar.to_bar_within(
            BarType::Time,
            bucket,
            self.bucket_end(bucket),
            TriggerReason::TimeBoundary,
            None,
        );
        self.bar.clear();
        bar
    }
}

impl BarAccumulator for TimeBars {
    fn accumulate(&mut self, tick: &Tick, side: Side) -> Option<Bar> {
        let bucket = bucket_start(tick.timestamp, self.duration_us);
        let closed = match self.current_bucket {
            Some(current) if bucket > current => {
                let closed = self.close_bucket(current);
                if self.empty_buckets == EmptyBucketPolicy::Emit {
                    if let Some(price) = closed.as_ref().map(|b| b.close) {
                        let mut empty = current + self.duration_us;
                        while empty < bucket {
                            self.gap_bars.push_back(flat_bar(
                                BarType::Time,
                                empty,
                                self.bucket_end(empty),
                                price,
                            ));
                            empty += self.duration_us;
                        }
                    }
                }
                self.current_bucket = Some(bucket);
                closed
            }
            Some(_) => None,
            None => {
                self.current_bucket = Some(bucket);
                None
            }
        };
        self.bar.add_tick(tick, side);
        closed
    }

    fn take_pending(&mut self) -> Option<Bar> {
        self.gap_bars.pop_front()
    }

    fn flush(&mut self) -> Option<Bar> {
        let bucket = self.current_bucket?;
        let bar = self
            .bar
            .to_bar(BarType::Time, TriggerReason::EndOfStream, None)
            .map(|mut bar| {
                bar.timestamp_start = bucket;
                bar
            });
        self.reset();
        bar
    }

    fn reset(&mut self) {
        self.bar.clear();
        self.current_bucket = None;
        self.gap_bars.clear();
    }
}
