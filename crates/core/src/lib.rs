//! Core types and configuration for the tickbar system.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (raw ticks, normalized ticks, bars, feature vectors)
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AdaptiveConfig, BarSpec, EmptyBucketPolicy, EndOfStreamPolicy, FeatureConfig,
    PipelineConfig, SignRule,
};
pub use error::{Error, MalformedTick, Result};
pub use types::*;
