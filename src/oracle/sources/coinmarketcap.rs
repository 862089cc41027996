//! CoinMarketCap Pro REST client
//!
//! Requires an API key. A missing key makes this adapter fail on every call;
//! it is never a configuration error for the oracle as a whole.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::FetchError;
use crate::oracle::sources::{fetch_json, http_client, number_field, PriceSource};
use crate::types::{Asset, Fiat, PriceSource as Source, Quote};

pub const COINMARKETCAP_API_URL: &str = "https://pro-api.coinmarketcap.com";
pub const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinMarketCapClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(Source::CoinMarketCap, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn cmc_symbol(asset: Asset) -> &'static str {
        match asset {
            Asset::DogeCash => "DOGEC",
            Asset::BTC => "BTC",
            Asset::ETH => "ETH",
            Asset::LTC => "LTC",
        }
    }
}

#[async_trait]
impl PriceSource for CoinMarketCapClient {
    fn kind(&self) -> Source {
        Source::CoinMarketCap
    }

    fn supports(&self, _asset: Asset, _fiat: Fiat) -> bool {
        true
    }

    async fn fetch_quote(&self, asset: Asset, fiat: Fiat) -> Result<Quote, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingCredential {
            provider: Source::CoinMarketCap,
        })?;

        let symbol = Self::cmc_symbol(asset);
        let url = format!(
            "{}/v2/cryptocurrency/quotes/latest?symbol={}&convert={}",
            self.base_url,
            symbol,
            fiat.code()
        );

        let request = self.client.get(&url).header(API_KEY_HEADER, api_key);
        let body: Value = fetch_json(Source::CoinMarketCap, request).await?;
        parse_latest(&body, symbol, fiat)
    }
}

/// Extract a quote from a `/v2/cryptocurrency/quotes/latest` payload
fn parse_latest(body: &Value, symbol: &str, fiat: Fiat) -> Result<Quote, FetchError> {
    let entry = body["data"][symbol]
        .get(0)
        .ok_or_else(|| FetchError::bad_schema(Source::CoinMarketCap, format!("no data for {}", symbol)))?;
    let quote = &entry["quote"][fiat.upper_code()];

    let price = number_field(&quote["price"]).ok_or_else(|| {
        FetchError::bad_schema(
            Source::CoinMarketCap,
            format!("missing quote.{}.price", fiat.upper_code()),
        )
    })?;

    Ok(Quote::new(Source::CoinMarketCap, price).with_market_data(
        number_field(&quote["percent_change_24h"]),
        number_field(&quote["market_cap"]),
        number_field(&quote["volume_24h"]),
        number_field(&entry["circulating_supply"]),
    ))
}
