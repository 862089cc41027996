//! Kraken public REST client
//!
//! Only BTC, ETH and LTC are listed. Kraken reports the result under its
//! own pair key (e.g., "XXBTZUSD"), so the first entry of `result` is used.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::FetchError;
use crate::oracle::sources::{fetch_json, http_client, number_field, PriceSource};
use crate::types::{Asset, Fiat, PriceSource as Source, Quote};

pub const KRAKEN_REST_URL: &str = "https://api.kraken.com";

#[derive(Debug, Clone, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, TickerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct TickerInfo {
    /// Last trade closed: [price, lot volume]
    #[serde(default)]
    c: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct KrakenClient {
    client: Client,
    base_url: String,
}

impl KrakenClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(Source::Kraken, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn base_code(asset: Asset) -> Option<&'static str> {
        match asset {
            Asset::BTC => Some("XBT"),
            Asset::ETH => Some("ETH"),
            Asset::LTC => Some("LTC"),
            Asset::DogeCash => None,
        }
    }

    fn pair(asset: Asset, fiat: Fiat) -> Option<String> {
        Self::base_code(asset).map(|base| format!("{}{}", base, fiat.upper_code()))
    }
}

#[async_trait]
impl PriceSource for KrakenClient {
    fn kind(&self) -> Source {
        Source::Kraken
    }

    fn supports(&self, asset: Asset, fiat: Fiat) -> bool {
        Self::pair(asset, fiat).is_some()
    }

    async fn fetch_quote(&self, asset: Asset, fiat: Fiat) -> Result<Quote, FetchError> {
        let pair = Self::pair(asset, fiat).ok_or(FetchError::UnsupportedPair {
            provider: Source::Kraken,
            asset,
            fiat,
        })?;

        let url = format!("{}/0/public/Ticker?pair={}", self.base_url, pair);
        let response: TickerResponse = fetch_json(Source::Kraken, self.client.get(&url)).await?;
        parse_ticker(response)
    }
}

fn parse_ticker(response: TickerResponse) -> Result<Quote, FetchError> {
    if !response.error.is_empty() {
        return Err(FetchError::bad_schema(
            Source::Kraken,
            response.error.join(", "),
        ));
    }

    let price = response
        .result
        .values()
        .next()
        .and_then(|info| info.c.first())
        .and_then(number_field)
        .ok_or_else(|| FetchError::bad_schema(Source::Kraken, "pair not found"))?;

    Ok(Quote::new(Source::Kraken, price))
}
