//! Query orchestration - validation, live consensus, stale fallback

use anyhow::Result;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{OracleError, OracleResult};
use crate::oracle::sources::{
    BinanceClient, CoinGeckoClient, CoinMarketCapClient, KrakenClient, PriceSource,
};
use crate::oracle::{PriceAggregator, QuoteCache, SnapshotFetcher};
use crate::types::{Asset, ConsensusResult, Fiat, PriceSource as Source, VerifiedQuote};

/// Public entry point: Fetcher → Consensus → Cache
pub struct PriceOracle {
    fetcher: SnapshotFetcher,
    aggregator: PriceAggregator,
    cache: Arc<QuoteCache>,
}

impl PriceOracle {
    pub fn new(fetcher: SnapshotFetcher, aggregator: PriceAggregator, cache: Arc<QuoteCache>) -> Self {
        Self {
            fetcher,
            aggregator,
            cache,
        }
    }

    /// Build the four HTTP adapters, weights and cache from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.timeout();
        let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();

        for kind in Source::ALL {
            let settings = config.sources.get(kind);
            if !settings.enabled {
                tracing::info!(source = %kind, "Price source disabled");
                continue;
            }

            let source: Arc<dyn PriceSource> = match kind {
                Source::CoinGecko => Arc::new(CoinGeckoClient::new(&settings.base_url, timeout)?),
                Source::CoinMarketCap => {
                    let api_key = config.coinmarketcap_api_key();
                    if api_key.is_none() {
                        tracing::warn!(source = %kind, "No API key configured, source will fail every request");
                    }
                    Arc::new(CoinMarketCapClient::new(&settings.base_url, api_key, timeout)?)
                }
                Source::Binance => Arc::new(BinanceClient::new(&settings.base_url, timeout)?),
                Source::Kraken => Arc::new(KrakenClient::new(&settings.base_url, timeout)?),
            };
            sources.push(source);
        }

        Ok(Self::new(
            SnapshotFetcher::new(sources, timeout),
            PriceAggregator::new(config.weights()),
            Arc::new(QuoteCache::new(config.staleness())),
        ))
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn fetcher(&self) -> &SnapshotFetcher {
        &self.fetcher
    }

    /// Verified price for a pair, falling back to a recent cached consensus
    /// when live consensus fails.
    pub async fn get_quote(&self, symbol: &str, fiat: &str) -> OracleResult<VerifiedQuote> {
        let (asset, fiat) = Self::resolve(symbol, fiat)?;

        match self.live(asset, fiat).await {
            Ok(result) => Ok(VerifiedQuote::from_consensus(&result, false)),
            Err(err) if err.allows_fallback() => match self.cache.fallback(asset, fiat).await {
                Some(cached) => {
                    tracing::warn!(
                        asset = %asset,
                        fiat = %fiat,
                        error = %err,
                        "Live consensus failed, serving stale price"
                    );
                    Ok(VerifiedQuote::from_consensus(&cached, true))
                }
                None => {
                    tracing::error!(asset = %asset, fiat = %fiat, error = %err, "No consensus and no usable cache");
                    Err(err)
                }
            },
            Err(err) => Err(err),
        }
    }

    /// Full live consensus, auxiliary market data included. No fallback.
    pub async fn snapshot(&self, symbol: &str, fiat: &str) -> OracleResult<ConsensusResult> {
        let (asset, fiat) = Self::resolve(symbol, fiat)?;
        self.live(asset, fiat).await
    }

    /// Validate input before any network activity
    fn resolve(symbol: &str, fiat: &str) -> OracleResult<(Asset, Fiat)> {
        let fiat = Fiat::from_code(fiat).ok_or_else(|| OracleError::UnsupportedFiat(fiat.trim().to_string()))?;
        let asset = Asset::from_symbol(symbol)
            .ok_or_else(|| OracleError::UnsupportedAsset(symbol.trim().to_string()))?;
        Ok((asset, fiat))
    }

    async fn live(&self, asset: Asset, fiat: Fiat) -> OracleResult<ConsensusResult> {
        let snapshot = self.fetcher.fetch(asset, fiat).await;
        let result = self.aggregator.aggregate(&snapshot)?;

        tracing::info!(
            asset = %asset,
            fiat = %fiat,
            price = result.price,
            confidence = result.confidence,
            sources = result.sources.len(),
            "Consensus price"
        );

        self.cache.store(result.clone()).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::oracle::sources::MockPriceSource;
    use crate::types::Quote;
    use std::time::Duration;

    fn untouchable(kind: Source) -> Arc<dyn PriceSource> {
        let mut mock = MockPriceSource::new();
        mock.expect_kind().return_const(kind);
        mock.expect_supports().return_const(true);
        mock.expect_fetch_quote().never();
        Arc::new(mock)
    }

    fn priced(kind: Source, price: f64) -> Arc<dyn PriceSource> {
        let mut mock = MockPriceSource::new();
        mock.expect_kind().return_const(kind);
        mock.expect_supports().return_const(true);
        mock.expect_fetch_quote()
            .returning(move |_, _| Ok(Quote::new(kind, price)));
        Arc::new(mock)
    }

    fn oracle(sources: Vec<Arc<dyn PriceSource>>) -> PriceOracle {
        PriceOracle::new(
            SnapshotFetcher::new(sources, Duration::from_secs(1)),
            PriceAggregator::default(),
            Arc::new(QuoteCache::default()),
        )
    }

    #[tokio::test]
    async fn test_invalid_input_makes_no_calls() {
        let oracle = oracle(Source::ALL.iter().map(|s| untouchable(*s)).collect());

        assert_eq!(
            oracle.get_quote("doge", "usd").await.unwrap_err(),
            OracleError::UnsupportedAsset("doge".into())
        );
        assert_eq!(
            oracle.get_quote("btc", "jpy").await.unwrap_err(),
            OracleError::UnsupportedFiat("jpy".into())
        );
        assert!(matches!(
            oracle.snapshot("xyz", "eur").await,
            Err(OracleError::UnsupportedAsset(_))
        ));
    }

    #[tokio::test]
    async fn test_fiat_checked_before_symbol() {
        let oracle = oracle(Vec::new());
        assert!(matches!(
            oracle.get_quote("nope", "nope").await,
            Err(OracleError::UnsupportedFiat(_))
        ));
    }

    #[tokio::test]
    async fn test_live_quote_is_cached() {
        let oracle = oracle(vec![
            priced(Source::CoinGecko, 100.0),
            priced(Source::Kraken, 100.0),
        ]);

        let quote = oracle.get_quote(" BTC ", "USD").await.unwrap();
        assert_eq!(quote.symbol, "btc");
        assert_eq!(quote.fiat, "usd");
        assert!(!quote.stale);
        assert_eq!(quote.sources, vec!["coingecko", "kraken"]);
        assert!(oracle.cache().fallback(Asset::BTC, Fiat::USD).await.is_some());
    }

    #[tokio::test]
    async fn test_failure_without_cache_propagates() {
        let mut failing = MockPriceSource::new();
        failing.expect_kind().return_const(Source::Kraken);
        failing.expect_supports().return_const(true);
        failing.expect_fetch_quote().returning(|_, _| {
            Err(FetchError::Timeout {
                provider: Source::Kraken,
            })
        });
        let oracle = oracle(vec![Arc::new(failing)]);

        let err = oracle.get_quote("ltc", "cad").await.unwrap_err();
        assert!(matches!(err, OracleError::InsufficientSources { available: 0, .. }));
    }

    #[test]
    fn test_from_config_respects_enabled_sources() {
        let mut config = AppConfig::defaults().unwrap();
        config.sources.binance.enabled = false;
        config.sources.kraken.enabled = false;

        let oracle = PriceOracle::from_config(&config).unwrap();
        assert_eq!(
            oracle.fetcher().source_kinds(),
            vec![Source::CoinGecko, Source::CoinMarketCap]
        );
        assert_eq!(oracle.cache().staleness(), chrono::Duration::hours(1));
    }
}
