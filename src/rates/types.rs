//! Data types for rate history, rolling samples and dashboard snapshots.

use crate::rates::apy::apy_from_rate;
use crate::types::RateKind;
use serde::{Deserialize, Serialize};

/// One observation of one side of a market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Annualized rate as a fraction (0.05 = 5%)
    pub rate: f64,
    /// APY derived from `rate` with daily compounding
    pub apy: f64,
}

impl RatePoint {
    /// Build a point from a raw rate, deriving the APY.
    pub fn from_rate(timestamp: i64, rate: f64) -> Self {
        Self {
            timestamp,
            rate,
            apy: apy_from_rate(rate),
        }
    }
}

/// One row of the rolling sample file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub timestamp: i64,
    /// Display date (`YYYY-MM-DD HH:MM` in the configured offset)
    pub date: String,
    pub deposit_rate: f64,
    pub deposit_apy: f64,
    pub borrow_rate: f64,
    pub borrow_apy: f64,
}

impl RateSample {
    /// Project the sample onto one side.
    pub fn point(&self, kind: RateKind) -> RatePoint {
        match kind {
            RateKind::Deposit => RatePoint {
                timestamp: self.timestamp,
                rate: self.deposit_rate,
                apy: self.deposit_apy,
            },
            RateKind::Borrow => RatePoint {
                timestamp: self.timestamp,
                rate: self.borrow_rate,
                apy: self.borrow_apy,
            },
        }
    }
}

/// Historical rates for both sides of a market, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateHistory {
    pub deposit: Vec<RatePoint>,
    pub borrow: Vec<RatePoint>,
}

impl RateHistory {
    pub fn side(&self, kind: RateKind) -> &[RatePoint] {
        match kind {
            RateKind::Deposit => &self.deposit,
            RateKind::Borrow => &self.borrow,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deposit.is_empty() && self.borrow.is_empty()
    }
}

/// A point-in-time read of both rates for one market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentRates {
    pub timestamp: i64,
    pub deposit: RatePoint,
    pub borrow: RatePoint,
}

impl CurrentRates {
    /// Convert into a sample row, formatting the date with `offset_hours`.
    pub fn into_sample(self, offset_hours: i32) -> RateSample {
        RateSample {
            timestamp: self.timestamp,
            date: crate::rates::apy::format_timestamp(self.timestamp, offset_hours),
            deposit_rate: self.deposit.rate,
            deposit_apy: self.deposit.apy,
            borrow_rate: self.borrow.rate,
            borrow_apy: self.borrow.apy,
        }
    }
}

/// Everything one refresh produces for a token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub token: String,
    /// Number of history entries requested
    pub days: usize,
    /// History followed by stored samples
    pub deposit: Vec<RatePoint>,
    pub borrow: Vec<RatePoint>,
    /// Rows currently held in the rolling sample file
    pub stored_samples: usize,
    /// Unix timestamp of the refresh
    pub refreshed_at: i64,
    /// Errors encountered while refreshing, joined for display
    pub error: Option<String>,
}

impl DashboardSnapshot {
    pub fn series(&self, kind: RateKind) -> &[RatePoint] {
        match kind {
            RateKind::Deposit => &self.deposit,
            RateKind::Borrow => &self.borrow,
        }
    }

    /// Most recent point of one side.
    pub fn latest(&self, kind: RateKind) -> Option<&RatePoint> {
        self.series(kind).last()
    }

    /// Number of points shown, counted on the deposit side.
    pub fn data_points(&self) -> usize {
        self.deposit.len()
    }

    pub fn has_data(&self) -> bool {
        !self.deposit.is_empty() || !self.borrow.is_empty()
    }
}

/// Requests from the dashboard to the sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerCommand {
    /// Switch the sampled token and refresh immediately
    SelectToken(String),
    /// Change how many history entries are fetched and refresh
    SetDays(usize),
    /// Refresh without waiting for the next tick
    RefreshNow,
}

// --- Communication Channels between sampler and dashboard ---

/// Channel for delivering refreshed snapshots to the dashboard
pub type SnapshotSender = tokio::sync::mpsc::Sender<DashboardSnapshot>;
pub type SnapshotReceiver = tokio::sync::mpsc::Receiver<DashboardSnapshot>;

/// Channel for dashboard requests to the sampler
pub type SamplerCommandSender = tokio::sync::mpsc::Sender<SamplerCommand>;
pub type SamplerCommandReceiver = tokio::sync::mpsc::Receiver<SamplerCommand>;
