//! Configuration section types

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::types::PriceSource;

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Per-source request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum age of a cached fallback in seconds
    pub staleness_secs: u64,
    /// Fiat used when a caller does not name one
    pub default_fiat: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Trust weight in the consensus average
    pub weight: f64,
    /// API credential (only CoinMarketCap needs one)
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub coingecko: SourceConfig,
    pub coinmarketcap: SourceConfig,
    pub binance: SourceConfig,
    pub kraken: SourceConfig,
}

impl SourcesConfig {
    pub fn get(&self, source: PriceSource) -> &SourceConfig {
        match source {
            PriceSource::CoinGecko => &self.coingecko,
            PriceSource::CoinMarketCap => &self.coinmarketcap,
            PriceSource::Binance => &self.binance,
            PriceSource::Kraken => &self.kraken,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Install the global tracing subscriber
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let result = match self.format.as_str() {
            "json" => fmt().json().with_env_filter(filter).try_init(),
            _ => fmt().with_env_filter(filter).try_init(),
        };

        if let Err(e) = result {
            eprintln!("Logging already initialized: {}", e);
        }
    }
}
