//! Runtime configuration for the sampler, data sources and dashboard.

use crate::types::SpotMarketConfig;
use anyhow::{anyhow, bail, Context, Result};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Configuration for the whole application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Base URL of the rate-history API
    pub api_base_url: String,
    /// Solana RPC endpoint used for spot market reads
    pub rpc_url: String,
    /// Tokens offered by the dashboard selector, first one selected on start
    pub tokens: Vec<String>,
    /// Markets added to (or overriding) the built-in registry
    pub extra_markets: Vec<SpotMarketConfig>,
    /// Directory holding the rolling sample files and the dashboard log
    pub data_dir: PathBuf,
    /// Rows kept in each rolling sample file
    pub max_samples: usize,
    /// Minimum age of the newest sample before a new one is taken
    pub min_sample_interval_seconds: u64,
    /// Dashboard auto-refresh interval
    pub refresh_interval_seconds: u64,
    /// History entries fetched per side (one per day upstream)
    pub history_days: usize,
    /// Offset from UTC used when rendering dates
    pub display_utc_offset_hours: i32,
    /// HTTP request timeout
    pub http_timeout_seconds: u64,
    /// RPC request timeout
    pub rpc_timeout_seconds: u64,
    /// Attempts made for each HTTP/RPC read
    pub retry_attempts: usize,
    /// Upper bound on rate-history requests per second
    pub rate_limit_requests_per_second: u32,
    /// How long a fetched history stays reusable
    pub history_cache_ttl_seconds: u64,
    /// Log verbosity: trace, debug, info, warn or error
    pub log_level: String,
}

/// Selector bounds for the history range control.
pub const MIN_HISTORY_DAYS: usize = 1;
pub const MAX_HISTORY_DAYS: usize = 30;

/// Accepted range for the display offset.
pub const UTC_OFFSET_HOURS: std::ops::RangeInclusive<i32> = -23..=23;

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://data.api.drift.trade".to_string(),
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            tokens: ["USDC", "SOL", "JLP", "wBTC", "jitoSOL"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extra_markets: Vec::new(),
            data_dir: PathBuf::from("./data"),
            max_samples: 30,
            min_sample_interval_seconds: 1800,
            refresh_interval_seconds: 60,
            history_days: MAX_HISTORY_DAYS,
            display_utc_offset_hours: 8,
            http_timeout_seconds: 10,
            rpc_timeout_seconds: 30,
            retry_attempts: 3,
            rate_limit_requests_per_second: 5,
            history_cache_ttl_seconds: 300,
            log_level: "info".to_string(),
        }
    }
}

impl RatesConfig {
    /// Load a TOML file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RatesConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Reject values the sampler cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            bail!("At least one token must be configured");
        }
        if self.max_samples == 0 {
            bail!("max_samples must be greater than zero");
        }
        if self.refresh_interval_seconds == 0 {
            bail!("refresh_interval_seconds must be greater than zero");
        }
        if !(MIN_HISTORY_DAYS..=MAX_HISTORY_DAYS).contains(&self.history_days) {
            bail!(
                "history_days must be between {} and {}",
                MIN_HISTORY_DAYS,
                MAX_HISTORY_DAYS
            );
        }
        if !UTC_OFFSET_HOURS.contains(&self.display_utc_offset_hours) {
            bail!(
                "display_utc_offset_hours must be between {} and {}",
                UTC_OFFSET_HOURS.start(),
                UTC_OFFSET_HOURS.end()
            );
        }
        if self.retry_attempts == 0 {
            bail!("retry_attempts must be greater than zero");
        }
        if self.rate_limit_requests_per_second == 0 {
            bail!("rate_limit_requests_per_second must be greater than zero");
        }
        self.log_level()?;
        Ok(())
    }

    pub fn token_list(&self) -> Result<NonEmpty<String>> {
        NonEmpty::from_vec(self.tokens.clone())
            .ok_or_else(|| anyhow!("At least one token must be configured"))
    }

    pub fn log_level(&self) -> Result<Level> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| anyhow!("Unknown log level: {}", self.log_level))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    pub fn min_sample_interval(&self) -> Duration {
        Duration::from_secs(self.min_sample_interval_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }

    pub fn history_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.history_cache_ttl_seconds)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("drift-rates.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = RatesConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.token_list().unwrap().head, "USDC");
        assert_eq!(config.max_samples, 30);
        assert_eq!(config.log_level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_default_tokens_resolve_to_markets() {
        let config = RatesConfig::default();
        for token in &config.tokens {
            assert!(
                crate::types::market_index_by_symbol(token, &config.extra_markets).is_ok(),
                "{} has no spot market",
                token
            );
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
tokens = ["SOL", "USDC"]
max_samples = 10

[[extra_markets]]
symbol = "zBTC"
market_index = 44
"#
        )
        .unwrap();

        let config = RatesConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tokens, vec!["SOL", "USDC"]);
        assert_eq!(config.max_samples, 10);
        assert_eq!(config.extra_markets, vec![SpotMarketConfig::new("zBTC", 44)]);
        assert_eq!(config.refresh_interval_seconds, 60);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RatesConfig::default();
        config.tokens.clear();
        assert!(config.validate().is_err());

        let mut config = RatesConfig::default();
        config.history_days = 31;
        assert!(config.validate().is_err());

        let mut config = RatesConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bounds_display_offset() {
        let mut config = RatesConfig::default();
        config.display_utc_offset_hours = -23;
        assert!(config.validate().is_ok());

        config.display_utc_offset_hours = 24;
        assert!(config.validate().is_err());

        config.display_utc_offset_hours = i32::MAX;
        assert!(config.validate().is_err());
    }
}
