//! Rates module - history fetch, on-chain reads and the rolling sampler
//!
//! This module contains the two data sources (rate-history API and spot
//! market accounts), the rolling per-token sample storage and the sampler
//! that combines them into dashboard snapshots.

pub mod apy;
pub mod config;
pub mod data_sources;
pub mod onchain;
pub mod sampler;
pub mod spot_market;
pub mod storage;
pub mod types;

// Re-export main types
pub use types::{
    CurrentRates, DashboardSnapshot, RateHistory, RatePoint, RateSample,
    SamplerCommand, SamplerCommandSender, SamplerCommandReceiver,
    SnapshotSender, SnapshotReceiver,
};

// Re-export key components
pub use config::RatesConfig;
pub use data_sources::{HistorySource, RateHistoryClient};
pub use onchain::{CurrentRateSource, OnChainRateReader};
pub use sampler::RateSampler;
pub use spot_market::SpotMarketRates;
pub use storage::{CsvSampleStore, SampleStorage};
