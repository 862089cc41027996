//! Binance spot REST client
//!
//! Uses the public ticker price endpoint. Binance does not list the primary
//! asset, and only USD (via USDT), EUR and GBP quote currencies are mapped.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::FetchError;
use crate::oracle::sources::{fetch_json, http_client, number_field, PriceSource};
use crate::types::{Asset, Fiat, PriceSource as Source, Quote};

pub const BINANCE_REST_URL: &str = "https://api.binance.com";

#[derive(Debug, Clone, Deserialize)]
struct TickerPrice {
    price: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(Source::Binance, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Trading pair for Binance (e.g., "BTCUSDT")
    fn trading_pair(asset: Asset, fiat: Fiat) -> Option<String> {
        if asset.is_primary() {
            return None;
        }
        let quote = match fiat {
            Fiat::USD => "USDT",
            Fiat::EUR => "EUR",
            Fiat::GBP => "GBP",
            Fiat::CAD | Fiat::AUD => return None,
        };
        Some(format!("{}{}", asset.symbol().to_uppercase(), quote))
    }
}

#[async_trait]
impl PriceSource for BinanceClient {
    fn kind(&self) -> Source {
        Source::Binance
    }

    fn supports(&self, asset: Asset, fiat: Fiat) -> bool {
        Self::trading_pair(asset, fiat).is_some()
    }

    async fn fetch_quote(&self, asset: Asset, fiat: Fiat) -> Result<Quote, FetchError> {
        let pair = Self::trading_pair(asset, fiat).ok_or(FetchError::UnsupportedPair {
            provider: Source::Binance,
            asset,
            fiat,
        })?;

        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, pair);
        let ticker: TickerPrice = fetch_json(Source::Binance, self.client.get(&url)).await?;

        let price = number_field(&ticker.price)
            .ok_or_else(|| FetchError::bad_schema(Source::Binance, "price is not numeric"))?;

        Ok(Quote::new(Source::Binance, price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trading_pairs() {
        assert_eq!(
            BinanceClient::trading_pair(Asset::BTC, Fiat::USD).as_deref(),
            Some("BTCUSDT")
        );
        assert_eq!(
            BinanceClient::trading_pair(Asset::LTC, Fiat::GBP).as_deref(),
            Some("LTCGBP")
        );
        assert_eq!(BinanceClient::trading_pair(Asset::ETH, Fiat::CAD), None);
        assert_eq!(BinanceClient::trading_pair(Asset::DogeCash, Fiat::USD), None);
    }

    #[tokio::test]
    async fn test_unsupported_pair_fails_fast() {
        let client = BinanceClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        assert!(!client.supports(Asset::DogeCash, Fiat::USD));

        let err = client
            .fetch_quote(Asset::DogeCash, Fiat::USD)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::UnsupportedPair {
                provider: Source::Binance,
                asset: Asset::DogeCash,
                fiat: Fiat::USD,
            }
        );
    }
}
