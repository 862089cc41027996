//! Price source implementations (CoinGecko, CoinMarketCap, Binance, Kraken)

mod binance;
mod coingecko;
mod coinmarketcap;
mod kraken;

pub use binance::{BinanceClient, BINANCE_REST_URL};
pub use coingecko::{CoinGeckoClient, COINGECKO_API_URL};
pub use coinmarketcap::{CoinMarketCapClient, COINMARKETCAP_API_URL};
pub use kraken::{KrakenClient, KRAKEN_REST_URL};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::FetchError;
use crate::types::{Asset, Fiat, PriceSource as Source, Quote};

/// Default per-request timeout for every provider
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Trait for price source adapters
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Which provider this adapter talks to
    fn kind(&self) -> Source;

    /// Whether the adapter can price this pair. Checked before dispatch.
    fn supports(&self, asset: Asset, fiat: Fiat) -> bool;

    /// Fetch one quote. Never retries.
    async fn fetch_quote(&self, asset: Asset, fiat: Fiat) -> Result<Quote, FetchError>;
}

/// Build the shared HTTP client for one adapter
pub(crate) fn http_client(provider: Source, timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .with_context(|| format!("Failed to create HTTP client for {}", provider))
}

/// Send a GET and decode a JSON body. Non-2xx status and any content type
/// other than `application/json` are failures.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: Source,
    request: RequestBuilder,
) -> Result<T, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| map_transport_error(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            provider,
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !is_json_content_type(&content_type) {
        return Err(FetchError::bad_schema(
            provider,
            format!("unexpected content type '{}'", content_type),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| map_transport_error(provider, e))?;

    serde_json::from_slice(&body).map_err(|e| FetchError::bad_schema(provider, e.to_string()))
}

fn map_transport_error(provider: Source, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { provider }
    } else {
        FetchError::Network {
            provider,
            message: err.to_string(),
        }
    }
}

/// Media type must be exactly `application/json`, parameters ignored
fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Parse a numeric field that providers send either as a number or a string
pub(crate) fn number_field(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_type_matching() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("Application/JSON"));
        assert!(!is_json_content_type("text/html"));
        assert!(!is_json_content_type("application/json-seq"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn test_number_field() {
        assert_eq!(number_field(&json!(1.5)), Some(1.5));
        assert_eq!(number_field(&json!("42.10")), Some(42.1));
        assert_eq!(number_field(&json!("n/a")), None);
        assert_eq!(number_field(&json!(null)), None);
    }
}
