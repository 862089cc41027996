//! Configuration management for the oracle
//!
//! Loads from optional config files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::oracle::sources::{
    BINANCE_REST_URL, COINGECKO_API_URL, COINMARKETCAP_API_URL, KRAKEN_REST_URL,
};
use crate::oracle::SourceWeights;
use crate::types::{Fiat, PriceSource};

/// Environment variable consulted when no CoinMarketCap key is configured
pub const CMC_API_KEY_ENV: &str = "COINMARKETCAP_API_KEY";
/// Prefix of environment overrides, e.g. `CONSENSUS__ORACLE__TIMEOUT_MS`
pub const ENV_PREFIX: &str = "CONSENSUS";
/// Longest cache fallback window accepted (one week)
pub const MAX_STALENESS_SECS: u64 = 7 * 24 * 3_600;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub sources: SourcesConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::with_defaults()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (CONSENSUS__*)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Built-in defaults only, ignoring files and environment
    pub fn defaults() -> Result<Self> {
        Self::with_defaults()?
            .build()
            .context("Failed to build default configuration")?
            .try_deserialize()
            .context("Failed to deserialize default configuration")
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            // Oracle defaults
            .set_default("oracle.timeout_ms", 6000)?
            .set_default("oracle.staleness_secs", 3600)?
            .set_default("oracle.default_fiat", "usd")?
            // Source defaults
            .set_default("sources.coingecko.enabled", true)?
            .set_default("sources.coingecko.base_url", COINGECKO_API_URL)?
            .set_default("sources.coingecko.weight", PriceSource::CoinGecko.default_weight())?
            .set_default("sources.coinmarketcap.enabled", true)?
            .set_default("sources.coinmarketcap.base_url", COINMARKETCAP_API_URL)?
            .set_default(
                "sources.coinmarketcap.weight",
                PriceSource::CoinMarketCap.default_weight(),
            )?
            .set_default("sources.binance.enabled", true)?
            .set_default("sources.binance.base_url", BINANCE_REST_URL)?
            .set_default("sources.binance.weight", PriceSource::Binance.default_weight())?
            .set_default("sources.kraken.enabled", true)?
            .set_default("sources.kraken.base_url", KRAKEN_REST_URL)?
            .set_default("sources.kraken.weight", PriceSource::Kraken.default_weight())?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        Ok(builder)
    }

    /// Reject settings the oracle cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.oracle.timeout_ms == 0 {
            bail!("oracle.timeout_ms must be greater than zero");
        }

        if self.oracle.staleness_secs == 0 || self.oracle.staleness_secs > MAX_STALENESS_SECS {
            bail!(
                "oracle.staleness_secs must be between 1 and {}, got {}",
                MAX_STALENESS_SECS,
                self.oracle.staleness_secs
            );
        }

        if Fiat::from_code(&self.oracle.default_fiat).is_none() {
            bail!("oracle.default_fiat '{}' is not supported", self.oracle.default_fiat);
        }

        for source in PriceSource::ALL {
            let weight = self.sources.get(source).weight;
            if !weight.is_finite() || weight <= 0.0 {
                bail!("sources.{}.weight must be a positive number, got {}", source, weight);
            }
        }

        if !PriceSource::ALL
            .iter()
            .any(|s| self.sources.get(*s).enabled)
        {
            bail!("At least one price source must be enabled");
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.oracle.timeout_ms)
    }

    /// Fallback window, clamped to [`MAX_STALENESS_SECS`]
    pub fn staleness(&self) -> chrono::Duration {
        let secs = self.oracle.staleness_secs.min(MAX_STALENESS_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn default_fiat(&self) -> Fiat {
        Fiat::from_code(&self.oracle.default_fiat).unwrap_or_default()
    }

    /// Consensus weights from the per-source settings
    pub fn weights(&self) -> SourceWeights {
        PriceSource::ALL
            .iter()
            .fold(SourceWeights::default(), |weights, source| {
                weights.with_weight(*source, self.sources.get(*source).weight)
            })
    }

    /// CoinMarketCap key from config, falling back to the environment
    pub fn coinmarketcap_api_key(&self) -> Option<String> {
        self.sources
            .coinmarketcap
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(CMC_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        let enabled: Vec<&str> = PriceSource::ALL
            .iter()
            .filter(|s| self.sources.get(**s).enabled)
            .map(|s| s.name())
            .collect();

        format!(
            "sources={:?} timeout_ms={} staleness_secs={} default_fiat={} cmc_key={}",
            enabled,
            self.oracle.timeout_ms,
            self.oracle.staleness_secs,
            self.oracle.default_fiat,
            if self.coinmarketcap_api_key().is_some() {
                "set"
            } else {
                "unset"
            }
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
