//! Microstructure feature computation for the tickbar system.
//!
//! This crate handles:
//! - Spread level, relative spread, rolling spread volatility and percentile
//! - VPIN over equal-volume buckets
//! - Order flow imbalance
//! - Trade intensity
//! - Price impact (Kyle's lambda, Amihud illiquidity)

pub mod engine;
pub mod impact;
pub mod intensity;
pub mod order_flow;
pub mod order_stats;
pub mod spread;
pub mod volatility;
pub mod vpin;

pub use engine::FeatureExtractor;
pub use impact::{AmihudIlliquidity, KyleLambda};
pub use intensity::TradeIntensity;
pub use order_flow::{FlowTotals, OrderFlowWindow};
pub use order_stats::{OrderStatTree, RollingPercentile};
pub use spread::{SpreadSnapshot, SpreadTracker};
pub use volatility::RollingStd;
pub use vpin::Vpin;
