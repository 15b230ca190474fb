//! Rate-history data source backed by the Drift data API.
//!
//! Requests are rate limited, retried with exponential backoff and memoized
//! for a short TTL so dashboard refreshes reuse the same download.

use crate::rates::config::RatesConfig;
use crate::rates::types::{RateHistory, RatePoint};
use crate::types::RateKind;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, info, instrument, warn};

/// Anything that can produce rate history for a token.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch the most recent `days` entries of each side.
    async fn fetch_rate_history(&self, token: &str, days: usize) -> Result<RateHistory>;

    /// Drop memoized responses so the next fetch goes upstream.
    fn clear_cache(&self) {}
}

/// Body of `GET /stats/{token}/rateHistory/{kind}`.
#[derive(Debug, Deserialize)]
struct RateHistoryResponse {
    rates: Vec<(NumericValue, NumericValue)>,
}

/// The API mixes JSON numbers and numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericValue {
    Number(f64),
    Text(String),
}

impl NumericValue {
    fn as_f64(&self) -> Result<f64> {
        match self {
            NumericValue::Number(n) => Ok(*n),
            NumericValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid numeric value: {:?}", s)),
        }
    }
}

/// HTTP client for the rate-history endpoint.
pub struct RateHistoryClient {
    http_client: Client,
    base_url: String,
    retry_attempts: usize,
    limiter: DefaultDirectRateLimiter,
    cache: Cache<(String, RateKind), Arc<Vec<RatePoint>>>,
}

impl RateHistoryClient {
    /// Create a client from configuration.
    pub fn new(config: &RatesConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(http_client, config))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(http_client: Client, config: &RatesConfig) -> Self {
        let per_second = NonZeroU32::new(config.rate_limit_requests_per_second)
            .unwrap_or(NonZeroU32::MIN);
        let cache = Cache::builder()
            .max_capacity(128)
            .time_to_live(config.history_cache_ttl())
            .build();

        Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            retry_attempts: config.retry_attempts,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            cache,
        }
    }

    /// URL of one side's history for a token.
    pub fn history_url(&self, token: &str, kind: RateKind) -> String {
        format!("{}/stats/{}/rateHistory/{}", self.base_url, token, kind.as_str())
    }

    /// Full history of one side, oldest first, served from cache when fresh.
    #[instrument(skip(self))]
    pub async fn fetch_side(&self, token: &str, kind: RateKind) -> Result<Arc<Vec<RatePoint>>> {
        let key = (token.to_string(), kind);
        if let Some(points) = self.cache.get(&key).await {
            debug!("Serving {} history for {} from cache", kind, token);
            return Ok(points);
        }

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.retry_attempts.saturating_sub(1));

        let points = Retry::spawn(retry_strategy, || self.fetch_side_once(token, kind)).await?;
        let points = Arc::new(points);
        self.cache.insert(key, points.clone()).await;
        Ok(points)
    }

    async fn fetch_side_once(&self, token: &str, kind: RateKind) -> Result<Vec<RatePoint>> {
        self.limiter.until_ready().await;

        let url = self.history_url(token, kind);
        info!("Fetching {} rate history...", kind);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Rate history request for {} {} failed: {}",
                token,
                kind,
                response.status()
            ));
        }

        let body: RateHistoryResponse = response
            .json()
            .await
            .context("Failed to parse rate history")?;

        let points = parse_rates(&body.rates)?;
        info!("{} rate history fetched successfully ({} entries).", kind, points.len());
        Ok(points)
    }
}

fn parse_rates(rates: &[(NumericValue, NumericValue)]) -> Result<Vec<RatePoint>> {
    rates
        .iter()
        .map(|(ts, rate)| Ok(RatePoint::from_rate(ts.as_f64()? as i64, rate.as_f64()?)))
        .collect()
}

/// Keep the most recent `days` entries.
pub fn take_recent(points: &[RatePoint], days: usize) -> Vec<RatePoint> {
    let start = points.len().saturating_sub(days);
    points[start..].to_vec()
}

#[async_trait]
impl HistorySource for RateHistoryClient {
    #[instrument(skip(self))]
    async fn fetch_rate_history(&self, token: &str, days: usize) -> Result<RateHistory> {
        let mut history = RateHistory::default();

        for kind in RateKind::all() {
            let points = match self.fetch_side(token, kind).await {
                Ok(points) => take_recent(&points, days),
                Err(e) => {
                    warn!("Error fetching {} history for {}: {:#}", kind, token, e);
                    Vec::new()
                }
            };
            match kind {
                RateKind::Deposit => history.deposit = points,
                RateKind::Borrow => history.borrow = points,
            }
        }

        Ok(history)
    }

    fn clear_cache(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_numeric_values() {
        let body: RateHistoryResponse =
            serde_json::from_str(r#"{"rates": [[1700000000, "0.05"], [1700086400, 0.06]]}"#)
                .unwrap();
        let points = parse_rates(&body.rates).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 1_700_000_000);
        assert_eq!(points[0].rate, 0.05);
        assert_eq!(points[1].rate, 0.06);
        assert!(points[1].apy > 0.06);
    }

    #[test]
    fn test_parse_rejects_garbage_rate() {
        let body: RateHistoryResponse =
            serde_json::from_str(r#"{"rates": [[1700000000, "n/a"]]}"#).unwrap();
        assert!(parse_rates(&body.rates).is_err());
    }

    #[test]
    fn test_take_recent_caps_at_available() {
        let points: Vec<RatePoint> = (0..5).map(|i| RatePoint::from_rate(i, 0.01)).collect();

        let recent = take_recent(&points, 3);
        assert_eq!(recent.iter().map(|p| p.timestamp).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(take_recent(&points, 30).len(), 5);
        assert!(take_recent(&[], 30).is_empty());
    }

    #[test]
    fn test_history_url_trims_trailing_slash() {
        let config = RatesConfig {
            api_base_url: "https://example.com/".to_string(),
            ..Default::default()
        };
        let client = RateHistoryClient::with_client(Client::new(), &config);
        assert_eq!(
            client.history_url("SOL", RateKind::Borrow),
            "https://example.com/stats/SOL/rateHistory/borrow"
        );
    }
}
