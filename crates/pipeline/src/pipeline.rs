//! Per-instrument pipeline.
//!
//! ```text
//! RawTick → TickNormalizer → Tick ─┬→ BarBuilder ───────→ Bar ─┐
//!                                  └→ FeatureExtractor → FeatureVector ─┴→ FeatureAligner → BarFeatureRow
//! ```
//!
//! The bar builder and the feature extractor each own their state; the only meeting
//! point is the aligner. A tick's bars are handed to the aligner before its feature
//! vector, which is what keeps features observed after a bar's close out of its row.

use crate::aligner::FeatureAligner;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tickbar_core::{Bar, BarFeatureRow, Error, PipelineConfig, RawTick, Result, Tick};
use tickbar_features::FeatureExtractor;
use tickbar_ingestion::{BarBuilder, NormalizerStats, TickNormalizer};
use tracing::info;

const CHECKPOINT_VERSION: u32 = 1;

/// Summary counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Raw ticks offered to the pipeline.
    pub ticks_received: u64,
    /// Ticks that reached the bar builder and feature extractor.
    pub ticks_processed: u64,
    /// Normalizer decisions (rejected, dropped, reordered).
    pub normalizer: NormalizerStats,
    pub bars_emitted: u64,
    pub rows_emitted: u64,
}

/// Bar construction and feature alignment for a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    config: PipelineConfig,
    normalizer: TickNormalizer,
    builder: BarBuilder,
    extractor: FeatureExtractor,
    aligner: FeatureAligner,
    stats: PipelineStats,
    #[serde(skip)]
    ticks: Vec<Tick>,
    #[serde(skip)]
    bars: Vec<Bar>,
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    version: u32,
    pipeline: &'a Pipeline,
}

#[derive(Deserialize)]
struct Checkpoint {
    version: u32,
    pipeline: Pipeline,
}

impl Pipeline {
    /// Build a pipeline. Any configuration error is returned before a tick is seen.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: TickNormalizer::new(config.out_of_order_tolerance_us)?,
            builder: BarBuilder::from_config(&config)?,
            extractor: FeatureExtractor::from_config(&config)?,
            aligner: FeatureAligner::new(),
            stats: PipelineStats::default(),
            ticks: Vec::new(),
            bars: Vec::new(),
            config,
        })
    }

    /// Process one raw tick and return the rows that became final.
    ///
    /// A malformed or too-late tick is dropped and reported as a non-fatal error
    /// (see [`Error::is_fatal`]); the pipeline stays usable.
    pub fn process_tick(&mut self, raw: &RawTick) -> Result<Vec<BarFeatureRow>> {
        self.stats.ticks_received += 1;
        let mut ticks = std::mem::take(&mut self.ticks);
        let pushed = self.normalizer.push(raw, &mut ticks);
        let rows = self.process_ready(&mut ticks);
        self.ticks = ticks;
        pushed.map(|()| rows)
    }

    /// Flush the reorder buffer, close the partial bar per policy and release every row.
    pub fn finish(&mut self) -> Vec<BarFeatureRow> {
        let mut ticks = std::mem::take(&mut self.ticks);
        self.normalizer.flush(&mut ticks);
        let mut rows = self.process_ready(&mut ticks);
        self.ticks = ticks;

        if let Some(bar) = self.builder.finish() {
            self.stats.bars_emitted += 1;
            self.aligner.push_bar(bar);
        }
        let released = rows.len();
        self.aligner.finish(&mut rows);
        self.stats.rows_emitted += (rows.len() - released) as u64;
        self.stats.normalizer = self.normalizer.stats().clone();

        info!(
            ticks_received = self.stats.ticks_received,
            ticks_processed = self.stats.ticks_processed,
            rejected = self.stats.normalizer.rejected,
            dropped_late = self.stats.normalizer.dropped_late,
            bars = self.stats.bars_emitted,
            rows = self.stats.rows_emitted,
            "pipeline finished"
        );
        rows
    }

    /// Run a complete tick stream, skipping rejected ticks.
    pub fn run<I>(&mut self, raw_ticks: I) -> Result<Vec<BarFeatureRow>>
    where
        I: IntoIterator,
        I::Item: Borrow<RawTick>,
    {
        let mut rows = Vec::new();
        for raw in raw_ticks {
            match self.process_tick(raw.borrow()) {
                Ok(ready) => rows.extend(ready),
                Err(e) if !e.is_fatal() => {}
                Err(e) => return Err(e),
            }
        }
        rows.extend(self.finish());
        Ok(rows)
    }

    fn process_ready(&mut self, ticks: &mut Vec<Tick>) -> Vec<BarFeatureRow> {
        let mut rows = Vec::new();
        for tick in ticks.drain(..) {
            self.stats.ticks_processed += 1;

            self.builder.push(&tick, &mut self.bars);
            self.stats.bars_emitted += self.bars.len() as u64;
            for bar in self.bars.drain(..) {
                self.aligner.push_bar(bar);
            }

            let features = self.extractor.update(&tick);
            self.aligner.push_feature(&features, &mut rows);
        }
        self.stats.rows_emitted += rows.len() as u64;
        rows
    }

    /// Serialize the full pipeline state, including the in-flight bar and every
    /// rolling window.
    pub fn checkpoint(&self) -> Result<String> {
        Ok(serde_json::to_string(&CheckpointRef {
            version: CHECKPOINT_VERSION,
            pipeline: self,
        })?)
    }

    /// Restore a pipeline from [`Pipeline::checkpoint`] output.
    pub fn from_checkpoint(json: &str) -> Result<Self> {
        let checkpoint: Checkpoint = serde_json::from_str(json)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(Error::checkpoint(format!(
                "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                checkpoint.version
            )));
        }
        let pipeline = checkpoint.pipeline;
        pipeline.config.validate()?;
        Ok(pipeline)
    }

    /// Restore a checkpoint, requiring it to have been taken under `config`.
    pub fn resume(config: &PipelineConfig, json: &str) -> Result<Self> {
        let pipeline = Self::from_checkpoint(json)?;
        if pipeline.config != *config {
            return Err(Error::checkpoint(
                "checkpoint was taken under a different configuration",
            ));
        }
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            normalizer: self.normalizer.stats().clone(),
            ..self.stats.clone()
        }
    }

    pub fn builder(&self) -> &BarBuilder {
        &self.builder
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }
}

/// Convenience: build a pipeline for `config` and run `raw_ticks` through it.
pub fn run<I>(config: PipelineConfig, raw_ticks: I) -> Result<Vec<BarFeatureRow>>
where
    I: IntoIterator,
    I::Item: Borrow<RawTick>,
{
    Pipeline::new(config)?.run(raw_ticks)
}
