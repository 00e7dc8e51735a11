//! End-to-end bar/feature pipeline for the tickbar system.
//!
//! This crate handles:
//! - Look-ahead-free alignment of bars with tick-level features
//! - The per-instrument pipeline, with checkpoint and resume
//! - Parallel processing of independent instruments

pub mod aligner;
pub mod batch;
pub mod pipeline;

pub use aligner::{align, FeatureAligner};
pub use batch::{
    process_instruments, BatchConfig, BatchOutput, BatchProcessor, InstrumentError,
    InstrumentInput, InstrumentResult,
};
pub use pipeline::{run, Pipeline, PipelineStats};
