//! drift-rates - Drift lending rate history sampler and terminal dashboard
//!
//! This crate fetches historical and current deposit/borrow rates for Drift
//! spot markets, keeps a capped rolling sample file per token and renders
//! both as a live terminal dashboard.

pub mod types;
pub mod rates;
pub mod dashboard;

// Re-export main types for convenience
pub use types::{RateKind, SpotMarketConfig};
