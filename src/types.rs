//! Core types used throughout the oracle
//!
//! Defines assets, fiat currencies, price sources, quotes and the
//! consensus results built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower sanity bound (exclusive) for any price we accept
pub const MIN_SANE_PRICE: f64 = 0.0;
/// Upper sanity bound (exclusive) for any price we accept
pub const MAX_SANE_PRICE: f64 = 1_000_000.0;
/// Largest believable 24h change in percent
pub const MAX_ABS_CHANGE_PCT: f64 = 1_000.0;

/// Check a price against the sanity bound
pub fn is_sane_price(price: f64) -> bool {
    price.is_finite() && price > MIN_SANE_PRICE && price < MAX_SANE_PRICE
}

/// Supported assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// DogeCash, the primary asset
    DogeCash,
    BTC,
    ETH,
    LTC,
}

impl Default for Asset {
    fn default() -> Self {
        Asset::DogeCash
    }
}

impl Asset {
    pub const ALL: [Asset; 4] = [Asset::DogeCash, Asset::BTC, Asset::ETH, Asset::LTC];

    /// Short input symbol (lowercase)
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::DogeCash => "dogec",
            Asset::BTC => "btc",
            Asset::ETH => "eth",
            Asset::LTC => "ltc",
        }
    }

    /// Canonical asset id, as used by CoinGecko
    pub fn canonical_id(&self) -> &'static str {
        match self {
            Asset::DogeCash => "dogecash",
            Asset::BTC => "bitcoin",
            Asset::ETH => "ethereum",
            Asset::LTC => "litecoin",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Asset::DogeCash)
    }

    /// Parse from a short symbol, ignoring case and surrounding whitespace
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dogec" => Some(Asset::DogeCash),
            "btc" => Some(Asset::BTC),
            "eth" => Some(Asset::ETH),
            "ltc" => Some(Asset::LTC),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Supported fiat currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fiat {
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl Default for Fiat {
    fn default() -> Self {
        Fiat::USD
    }
}

impl Fiat {
    pub const ALL: [Fiat; 5] = [Fiat::USD, Fiat::EUR, Fiat::GBP, Fiat::CAD, Fiat::AUD];

    /// Lowercase ISO code (e.g., "usd")
    pub fn code(&self) -> &'static str {
        match self {
            Fiat::USD => "usd",
            Fiat::EUR => "eur",
            Fiat::GBP => "gbp",
            Fiat::CAD => "cad",
            Fiat::AUD => "aud",
        }
    }

    /// Uppercase ISO code (e.g., "USD")
    pub fn upper_code(&self) -> &'static str {
        match self {
            Fiat::USD => "USD",
            Fiat::EUR => "EUR",
            Fiat::GBP => "GBP",
            Fiat::CAD => "CAD",
            Fiat::AUD => "AUD",
        }
    }

    /// Parse from an ISO code, ignoring case and surrounding whitespace
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "usd" => Some(Fiat::USD),
            "eur" => Some(Fiat::EUR),
            "gbp" => Some(Fiat::GBP),
            "cad" => Some(Fiat::CAD),
            "aud" => Some(Fiat::AUD),
            _ => None,
        }
    }
}

impl fmt::Display for Fiat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Price source identifier
///
/// Every source declares its trust weight here, so adding a provider
/// without a weight does not compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    CoinGecko,
    #[serde(rename = "cmc")]
    CoinMarketCap,
    Binance,
    Kraken,
}

impl PriceSource {
    pub const ALL: [PriceSource; 4] = [
        PriceSource::CoinGecko,
        PriceSource::CoinMarketCap,
        PriceSource::Binance,
        PriceSource::Kraken,
    ];

    /// Provider name as reported to callers
    pub fn name(&self) -> &'static str {
        match self {
            PriceSource::CoinGecko => "coingecko",
            PriceSource::CoinMarketCap => "cmc",
            PriceSource::Binance => "binance",
            PriceSource::Kraken => "kraken",
        }
    }

    /// Default trust weight used by the consensus engine
    pub fn default_weight(&self) -> f64 {
        match self {
            PriceSource::CoinGecko => 0.3,
            PriceSource::CoinMarketCap => 0.3,
            PriceSource::Binance => 0.2,
            PriceSource::Kraken => 0.2,
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Normalized quote from a single source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub source: PriceSource,
    pub price: f64,
    /// 24h change in percent
    pub change_pct_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub circulating: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Price-only quote stamped now
    pub fn new(source: PriceSource, price: f64) -> Self {
        Self {
            source,
            price,
            change_pct_24h: None,
            market_cap: None,
            volume_24h: None,
            circulating: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach auxiliary market data. Non-finite values are dropped, as is an
    /// implausible 24h change.
    pub fn with_market_data(
        mut self,
        change_pct_24h: Option<f64>,
        market_cap: Option<f64>,
        volume_24h: Option<f64>,
        circulating: Option<f64>,
    ) -> Self {
        self.change_pct_24h = change_pct_24h
            .filter(|c| c.is_finite() && c.abs() < MAX_ABS_CHANGE_PCT);
        self.market_cap = market_cap.filter(|v| v.is_finite());
        self.volume_24h = volume_24h.filter(|v| v.is_finite());
        self.circulating = circulating.filter(|v| v.is_finite());
        self
    }

    pub fn is_sane(&self) -> bool {
        is_sane_price(self.price)
    }
}

/// Outlier-filtered, weighted consensus for one asset/fiat pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub asset: Asset,
    pub fiat: Fiat,
    pub price: f64,
    /// Copied from the reference source, never cross-validated
    pub change_pct_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub circulating: Option<f64>,
    /// Surviving sources / attempted sources, in [0, 1]
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<PriceSource>,
}

/// Public view of a consensus price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedQuote {
    pub symbol: String,
    pub fiat: String,
    pub price: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<String>,
    /// Served from cache after live consensus failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl VerifiedQuote {
    pub fn from_consensus(result: &ConsensusResult, stale: bool) -> Self {
        Self {
            symbol: result.asset.symbol().to_string(),
            fiat: result.fiat.code().to_string(),
            price: result.price,
            confidence: result.confidence,
            timestamp: result.timestamp,
            sources: result.sources.iter().map(|s| s.name().to_string()).collect(),
            stale,
        }
    }
}
