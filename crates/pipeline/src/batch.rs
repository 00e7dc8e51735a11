//! Parallel processing of independent instruments.
//!
//! Each instrument gets its own [`Pipeline`]; no state is shared between them, so
//! instruments run on a rayon pool while each stream is still processed in order.
//! Results come back in input order regardless of scheduling.

use crate::pipeline::{Pipeline, PipelineStats};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tickbar_core::{BarFeatureRow, Error, PipelineConfig, RawTick, Result};
use tracing::{info, warn};

/// One instrument's input stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentInput {
    pub instrument: String,
    pub ticks: Vec<RawTick>,
}

/// Output for an instrument that completed.
#[derive(Debug, Clone)]
pub struct InstrumentResult {
    pub instrument: String,
    pub rows: Vec<BarFeatureRow>,
    pub stats: PipelineStats,
    /// Processing time for this instrument.
    pub elapsed: Duration,
    /// Pool thread that processed it (for debugging).
    pub thread_id: usize,
}

/// Error information for a failed instrument.
#[derive(Debug, Clone)]
pub struct InstrumentError {
    pub instrument: String,
    pub error: String,
}

/// Batch configuration.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Worker threads; `None` uses rayon's default.
    pub num_threads: Option<usize>,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads.max(1));
        self
    }

    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Aggregated batch results.
#[derive(Debug)]
pub struct BatchOutput {
    /// Completed instruments, in input order.
    pub results: Vec<InstrumentResult>,
    pub errors: Vec<InstrumentError>,
    /// Wall clock time.
    pub elapsed: Duration,
    pub threads_used: usize,
}

impl BatchOutput {
    pub fn successful_count(&self) -> usize {
        self.results.len()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    pub fn total_rows(&self) -> usize {
        self.results.iter().map(|r| r.rows.len()).sum()
    }

    pub fn all_successful(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, instrument: &str) -> Option<&InstrumentResult> {
        self.results.iter().find(|r| r.instrument == instrument)
    }
}

/// Runs one pipeline configuration over many instruments in parallel.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    pipeline_config: PipelineConfig,
    batch_config: BatchConfig,
}

impl BatchProcessor {
    /// The pipeline configuration is validated here, once, before any work starts.
    pub fn new(pipeline_config: PipelineConfig, batch_config: BatchConfig) -> Result<Self> {
        pipeline_config.validate()?;
        Ok(Self {
            pipeline_config,
            batch_config,
        })
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.pipeline_config
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    pub fn process(&self, inputs: &[InstrumentInput]) -> Result<BatchOutput> {
        let start = Instant::now();
        let threads_used = self.batch_config.effective_threads();

        // Local pool so separate processors can use different thread counts.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads_used)
            .build()
            .map_err(|e| Error::Batch(format!("failed to create thread pool: {e}")))?;

        let outcomes: Vec<std::result::Result<InstrumentResult, InstrumentError>> =
            pool.install(|| {
                inputs
                    .par_iter()
                    .map(|input| self.process_one(input))
                    .collect()
            });

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(error) => {
                    warn!(
                        instrument = %error.instrument,
                        error = %error.error,
                        "instrument failed"
                    );
                    errors.push(error);
                }
            }
        }

        let output = BatchOutput {
            results,
            errors,
            elapsed: start.elapsed(),
            threads_used,
        };
        info!(
            instruments = inputs.len(),
            succeeded = output.successful_count(),
            failed = output.failed_count(),
            rows = output.total_rows(),
            threads = threads_used,
            elapsed_ms = output.elapsed.as_millis() as u64,
            "batch finished"
        );
        Ok(output)
    }

    fn process_one(
        &self,
        input: &InstrumentInput,
    ) -> std::result::Result<InstrumentResult, InstrumentError> {
        let start = Instant::now();
        let fail = |e: Error| InstrumentError {
            instrument: input.instrument.clone(),
            error: e.to_string(),
        };
        let mut pipeline = Pipeline::new(self.pipeline_config.clone()).map_err(fail)?;
        let rows = pipeline.run(&input.ticks).map_err(fail)?;
        Ok(InstrumentResult {
            instrument: input.instrument.clone(),
            rows,
            stats: pipeline.stats(),
            elapsed: start.elapsed(),
            thread_id: rayon::current_thread_index().unwrap_or(0),
        })
    }
}

/// Process instruments with default batch settings.
pub fn process_instruments(
    config: PipelineConfig,
    inputs: &[InstrumentInput],
) -> Result<BatchOutput> {
    BatchProcessor::new(config, BatchConfig::new())?.process(inputs)
}
