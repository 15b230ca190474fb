//! Core types shared across the drift-rates crate.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a lending market a rate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    /// Rate paid to depositors
    Deposit,
    /// Rate charged to borrowers
    Borrow,
}

impl RateKind {
    /// Path segment used by the rate-history API.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateKind::Deposit => "deposit",
            RateKind::Borrow => "borrow",
        }
    }

    /// Both sides, deposit first.
    pub fn all() -> [RateKind; 2] {
        [RateKind::Deposit, RateKind::Borrow]
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Drift spot market known by symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotMarketConfig {
    /// Token symbol as listed by the protocol (e.g. "SOL", "jitoSOL")
    pub symbol: String,
    /// Spot market index used to derive the market account address
    pub market_index: u16,
}

impl SpotMarketConfig {
    pub fn new(symbol: &str, market_index: u16) -> Self {
        Self {
            symbol: symbol.to_string(),
            market_index,
        }
    }
}

/// Built-in mainnet spot markets.
pub fn mainnet_spot_markets() -> Vec<SpotMarketConfig> {
    vec![
        SpotMarketConfig::new("USDC", 0),
        SpotMarketConfig::new("SOL", 1),
        SpotMarketConfig::new("mSOL", 2),
        SpotMarketConfig::new("wBTC", 3),
        SpotMarketConfig::new("wETH", 4),
        SpotMarketConfig::new("USDT", 5),
        SpotMarketConfig::new("jitoSOL", 6),
        SpotMarketConfig::new("PYTH", 7),
        SpotMarketConfig::new("bSOL", 8),
        SpotMarketConfig::new("JTO", 9),
        SpotMarketConfig::new("WIF", 10),
        SpotMarketConfig::new("JUP", 11),
        SpotMarketConfig::new("RENDER", 12),
        SpotMarketConfig::new("W", 13),
        SpotMarketConfig::new("TNSR", 14),
        SpotMarketConfig::new("DRIFT", 15),
        SpotMarketConfig::new("INF", 16),
        SpotMarketConfig::new("dSOL", 17),
        SpotMarketConfig::new("USDY", 18),
        SpotMarketConfig::new("JLP", 19),
        SpotMarketConfig::new("POPCAT", 20),
        SpotMarketConfig::new("CLOUD", 21),
        SpotMarketConfig::new("PYUSD", 22),
        SpotMarketConfig::new("USDe", 23),
        SpotMarketConfig::new("sUSDe", 24),
        SpotMarketConfig::new("BNSOL", 25),
        SpotMarketConfig::new("MOTHER", 26),
        SpotMarketConfig::new("cbBTC", 27),
    ]
}

/// Resolve a market index by exact symbol match.
///
/// `extra` entries take precedence over the built-in registry so a config
/// file can add or correct markets without a rebuild.
pub fn market_index_by_symbol(symbol: &str, extra: &[SpotMarketConfig]) -> Result<u16> {
    extra
        .iter()
        .chain(mainnet_spot_markets().iter())
        .find(|cf| cf.symbol == symbol)
        .map(|cf| cf.market_index)
        .ok_or_else(|| anyhow!("Symbol {} not found in spot market configs.", symbol))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_builtin_market() {
        assert_eq!(market_index_by_symbol("USDC", &[]).unwrap(), 0);
        assert_eq!(market_index_by_symbol("SOL", &[]).unwrap(), 1);
        assert_eq!(market_index_by_symbol("jitoSOL", &[]).unwrap(), 6);
    }

    #[test]
    fn test_registry_indices_are_contiguous_and_unique() {
        let indices: Vec<u16> = mainnet_spot_markets().iter().map(|m| m.market_index).collect();
        assert_eq!(indices, (0..=27).collect::<Vec<u16>>());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let err = market_index_by_symbol("sol", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Symbol sol not found in spot market configs.");
    }

    #[test]
    fn test_extra_markets_override_builtin() {
        let extra = vec![SpotMarketConfig::new("zBTC", 44), SpotMarketConfig::new("SOL", 99)];
        assert_eq!(market_index_by_symbol("zBTC", &extra).unwrap(), 44);
        assert_eq!(market_index_by_symbol("SOL", &extra).unwrap(), 99);
    }

    #[test]
    fn test_rate_kind_path_segment() {
        assert_eq!(RateKind::Deposit.as_str(), "deposit");
        assert_eq!(RateKind::Borrow.to_string(), "borrow");
    }
}
