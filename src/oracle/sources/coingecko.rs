//! CoinGecko REST client
//!
//! Prices every supported asset against every supported fiat, and is the
//! only source that carries full market data (change, cap, volume, supply).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::FetchError;
use crate::oracle::sources::{fetch_json, http_client, number_field, PriceSource};
use crate::types::{Asset, Fiat, PriceSource as Source, Quote};

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(Source::CoinGecko, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn coin_url(&self, asset: Asset) -> String {
        format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
            self.base_url,
            asset.canonical_id()
        )
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn kind(&self) -> Source {
        Source::CoinGecko
    }

    fn supports(&self, _asset: Asset, _fiat: Fiat) -> bool {
        true
    }

    async fn fetch_quote(&self, asset: Asset, fiat: Fiat) -> Result<Quote, FetchError> {
        let url = self.coin_url(asset);
        tracing::debug!(source = %Source::CoinGecko, asset = %asset, fiat = %fiat, "Fetching coin data");

        let body: Value = fetch_json(Source::CoinGecko, self.client.get(&url)).await?;
        parse_coin(&body, fiat)
    }
}

/// Extract a quote from a `/coins/{id}` payload
fn parse_coin(body: &Value, fiat: Fiat) -> Result<Quote, FetchError> {
    let market_data = body
        .get("market_data")
        .ok_or_else(|| FetchError::bad_schema(Source::CoinGecko, "missing market_data"))?;
    let code = fiat.code();

    let price = number_field(&market_data["current_price"][code]).ok_or_else(|| {
        FetchError::bad_schema(Source::CoinGecko, format!("missing current_price.{}", code))
    })?;

    Ok(Quote::new(Source::CoinGecko, price).with_market_data(
        number_field(&market_data["price_change_percentage_24h"]),
        number_field(&market_data["market_cap"][code]),
        number_field(&market_data["total_volume"][code]),
        number_field(&market_data["circulating_supply"]),
    ))
}
