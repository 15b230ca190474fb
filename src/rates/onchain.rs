//! Current deposit/borrow rates read from the spot market account on chain.

use crate::rates::config::RatesConfig;
use crate::rates::spot_market::{spot_market_address, SpotMarketRates};
use crate::rates::types::{CurrentRates, RatePoint};
use crate::types::{market_index_by_symbol, SpotMarketConfig};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument};

/// Anything that can produce a point-in-time rate read for a token.
#[async_trait]
pub trait CurrentRateSource: Send + Sync {
    async fn fetch_current_rates(&self, symbol: &str) -> Result<CurrentRates>;
}

/// Turn a decoded market into rate points stamped with `timestamp`.
pub fn current_rates_from_market(market: &SpotMarketRates, timestamp: i64) -> CurrentRates {
    let (deposit_rate, borrow_rate) = market.rates();
    CurrentRates {
        timestamp,
        deposit: RatePoint::from_rate(timestamp, deposit_rate),
        borrow: RatePoint::from_rate(timestamp, borrow_rate),
    }
}

/// Reads spot market accounts through a Solana RPC endpoint.
pub struct OnChainRateReader {
    rpc_client: Arc<RpcClient>,
    extra_markets: Vec<SpotMarketConfig>,
    retry_attempts: usize,
}

impl OnChainRateReader {
    pub fn new(config: &RatesConfig) -> Self {
        let rpc_client = Arc::new(RpcClient::new_with_timeout(
            config.rpc_url.clone(),
            config.rpc_timeout(),
        ));
        Self::with_client(rpc_client, config)
    }

    pub fn with_client(rpc_client: Arc<RpcClient>, config: &RatesConfig) -> Self {
        Self {
            rpc_client,
            extra_markets: config.extra_markets.clone(),
            retry_attempts: config.retry_attempts,
        }
    }

    /// Fetch and decode the spot market account for `market_index`.
    #[instrument(skip(self))]
    pub async fn fetch_spot_market(&self, market_index: u16) -> Result<SpotMarketRates> {
        let address = spot_market_address(market_index)?;
        let retry_strategy = ExponentialBackoff::from_millis(250)
            .max_delay(Duration::from_secs(5))
            .take(self.retry_attempts.saturating_sub(1));

        let data = Retry::spawn(retry_strategy, || self.rpc_client.get_account_data(&address))
            .await
            .with_context(|| format!("Failed to read spot market account {}", address))?;

        let market = SpotMarketRates::decode(&data)
            .with_context(|| format!("Failed to decode spot market account {}", address))?;
        if market.market_index != market_index {
            bail!(
                "Spot market account {} holds market {} instead of {}",
                address,
                market.market_index,
                market_index
            );
        }

        debug!(
            "Spot market {} utilization {} borrow rate {}",
            market_index,
            market.utilization(),
            market.borrow_rate()
        );
        Ok(market)
    }
}

#[async_trait]
impl CurrentRateSource for OnChainRateReader {
    #[instrument(skip(self))]
    async fn fetch_current_rates(&self, symbol: &str) -> Result<CurrentRates> {
        let market_index = market_index_by_symbol(symbol, &self.extra_markets)?;
        let market = self.fetch_spot_market(market_index).await?;
        Ok(current_rates_from_market(&market, chrono::Utc::now().timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_rates_from_market() {
        let market = SpotMarketRates {
            decimals: 9,
            deposit_balance: 1_000_000_000,
            borrow_balance: 250_000_000,
            cumulative_deposit_interest: 10_000_000_000,
            cumulative_borrow_interest: 10_000_000_000,
            optimal_utilization: 500_000,
            optimal_borrow_rate: 80_000,
            max_borrow_rate: 800_000,
            insurance_fund_total_factor: 0,
            ..Default::default()
        };
        let current = current_rates_from_market(&market, 42);

        // 25% utilization of a 50% kink at 8% -> 4% borrow, 1% deposit
        assert_eq!(current.timestamp, 42);
        assert!((current.borrow.rate - 0.04).abs() < 1e-12);
        assert!((current.deposit.rate - 0.01).abs() < 1e-12);
        assert!(current.borrow.apy > current.borrow.rate);
    }

    #[tokio::test]
    async fn test_unknown_symbol_fails_before_rpc() {
        let config = RatesConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let reader = OnChainRateReader::new(&config);
        let err = reader.fetch_current_rates("NOPE").await.unwrap_err();
        assert!(err.to_string().contains("not found in spot market configs"));
    }
}
