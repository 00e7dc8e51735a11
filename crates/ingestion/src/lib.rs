//! Data ingestion and bar construction for the tickbar system.
//!
//! This crate handles:
//! - Tick validation, time-base normalization and out-of-order repair
//! - Trade side inference (reported side, quote rule, tick rule)
//! - Bar building (time, tick, volume, dollar, imbalance, run)

pub mod bar_builder;
pub mod classifier;
pub mod normalizer;

pub use bar_builder::{BarAccumulator, BarBuilder, BarStrategy};
pub use classifier::{ClassificationStats, TickClassifier};
pub use normalizer::{normalize, NormalizerStats, TickNormalizer};
