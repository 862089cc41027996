//! Oracle Aggregator - Combines quotes from multiple sources
//!
//! Median-centred outlier rejection followed by a trust-weighted average.
//! Confidence is the share of attempted sources that made it into the
//! final price, so it reflects both availability and agreement.

use chrono::Utc;

use crate::error::{OracleError, OracleResult};
use crate::oracle::Snapshot;
use crate::types::{is_sane_price, ConsensusResult, PriceSource as Source, Quote};

/// Minimum number of agreeing quotes for a consensus
pub const MIN_SOURCES: usize = 2;
/// Outlier band half-width, in deviations around the median
pub const OUTLIER_DEVIATIONS: f64 = 2.0;
/// Weight given to a source whose configured weight is unusable
pub const DEFAULT_SOURCE_WEIGHT: f64 = 0.1;
/// Widest band, as a fraction of the median, allowed when the other quotes
/// agree exactly
pub const MAX_AGREEMENT_SPREAD: f64 = 0.01;

/// Median of a price list. Even counts average the two central values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Square root of the mean squared deviation from `center`
pub fn deviation_around(values: &[f64], center: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Trust weight per source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWeights {
    coingecko: f64,
    coinmarketcap: f64,
    binance: f64,
    kraken: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            coingecko: Source::CoinGecko.default_weight(),
            coinmarketcap: Source::CoinMarketCap.default_weight(),
            binance: Source::Binance.default_weight(),
            kraken: Source::Kraken.default_weight(),
        }
    }
}

impl SourceWeights {
    pub fn weight(&self, source: Source) -> f64 {
        match source {
            Source::CoinGecko => self.coingecko,
            Source::CoinMarketCap => self.coinmarketcap,
            Source::Binance => self.binance,
            Source::Kraken => self.kraken,
        }
    }

    /// Override one weight. Non-positive or non-finite weights fall back to
    /// [`DEFAULT_SOURCE_WEIGHT`].
    pub fn with_weight(mut self, source: Source, weight: f64) -> Self {
        let weight = if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            DEFAULT_SOURCE_WEIGHT
        };
        match source {
            Source::CoinGecko => self.coingecko = weight,
            Source::CoinMarketCap => self.coinmarketcap = weight,
            Source::Binance => self.binance = weight,
            Source::Kraken => self.kraken = weight,
        }
        self
    }
}

/// Consensus engine over one snapshot at a time
#[derive(Debug, Clone)]
pub struct PriceAggregator {
    weights: SourceWeights,
    /// Source whose auxiliary market data is copied into the result
    reference: Source,
}

impl PriceAggregator {
    pub fn new(weights: SourceWeights) -> Self {
        Self {
            weights,
            reference: Source::CoinGecko,
        }
    }

    pub fn with_reference(mut self, reference: Source) -> Self {
        self.reference = reference;
        self
    }

    pub fn weights(&self) -> &SourceWeights {
        &self.weights
    }

    /// Build a consensus from a snapshot
    pub fn aggregate(&self, snapshot: &Snapshot) -> OracleResult<ConsensusResult> {
        let sane: Vec<&Quote> = snapshot.quotes.iter().filter(|q| q.is_sane()).collect();

        for quote in snapshot.quotes.iter().filter(|q| !q.is_sane()) {
            tracing::debug!(source = %quote.source, price = quote.price, "Discarding quote outside sanity bound");
        }

        if sane.len() < MIN_SOURCES {
            // Every quote out of bounds: the aggregate over them is out of bounds too
            if sane.is_empty() && snapshot.quotes.len() >= MIN_SOURCES {
                let all: Vec<&Quote> = snapshot.quotes.iter().collect();
                let price = self.weighted_price(&all);
                tracing::warn!(asset = %snapshot.asset, fiat = %snapshot.fiat, price, "Aggregate price out of bounds");
                return Err(OracleError::InvalidAggregate { price });
            }
            return Err(OracleError::InsufficientSources {
                available: sane.len(),
                required: MIN_SOURCES,
            });
        }

        let survivors = self.reject_outliers(&sane);
        if survivors.len() < MIN_SOURCES {
            return Err(OracleError::InsufficientSources {
                available: survivors.len(),
                required: MIN_SOURCES,
            });
        }

        let price = self.weighted_price(&survivors);
        if !is_sane_price(price) {
            tracing::warn!(asset = %snapshot.asset, fiat = %snapshot.fiat, price, "Aggregate price out of bounds");
            return Err(OracleError::InvalidAggregate { price });
        }

        let reference = survivors.iter().find(|q| q.source == self.reference);
        let confidence =
            (survivors.len() as f64 / snapshot.attempted.max(1) as f64).clamp(0.0, 1.0);

        Ok(ConsensusResult {
            asset: snapshot.asset,
            fiat: snapshot.fiat,
            price,
            change_pct_24h: reference.and_then(|q| q.change_pct_24h),
            market_cap: reference.and_then(|q| q.market_cap),
            volume_24h: reference.and_then(|q| q.volume_24h),
            circulating: reference.and_then(|q| q.circulating),
            confidence,
            timestamp: Utc::now(),
            sources: survivors.iter().map(|q| q.source).collect(),
        })
    }

    /// Keep quotes within the deviation band around the median.
    ///
    /// Each quote is measured against the deviation of the other quotes, so
    /// a lone outlier cannot widen its own band. When those others agree
    /// exactly, the whole-set band applies, capped at
    /// [`MAX_AGREEMENT_SPREAD`] of the median.
    fn reject_outliers<'a>(&self, quotes: &[&'a Quote]) -> Vec<&'a Quote> {
        let prices: Vec<f64> = quotes.iter().map(|q| q.price).collect();
        let center = match median(&prices) {
            Some(center) => center,
            None => return Vec::new(),
        };

        let spread = deviation_around(&prices, center);
        // Exact agreement
        if spread == 0.0 {
            return quotes.to_vec();
        }
        // Peers agree exactly: whole-set band, capped
        let agreement_band = (OUTLIER_DEVIATIONS * spread).min(MAX_AGREEMENT_SPREAD * center);

        quotes
            .iter()
            .enumerate()
            .filter(|(i, quote)| {
                let others: Vec<f64> = prices
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| j != i)
                    .map(|(_, p)| *p)
                    .collect();
                let others_spread = deviation_around(&others, center);
                let band = if others_spread == 0.0 {
                    agreement_band
                } else {
                    OUTLIER_DEVIATIONS * others_spread
                };
                let keep = (quote.price - center).abs() <= band;
                if !keep {
                    tracing::debug!(
                        source = %quote.source,
                        price = quote.price,
                        median = center,
                        band,
                        "Rejecting outlier quote"
                    );
                }
                keep
            })
            .map(|(_, quote)| *quote)
            .collect()
    }

    fn weighted_price(&self, quotes: &[&Quote]) -> f64 {
        let total_weight: f64 = quotes.iter().map(|q| self.weights.weight(q.source)).sum();
        if total_weight <= 0.0 {
            return f64::NAN;
        }
        quotes
            .iter()
            .map(|q| q.price * self.weights.weight(q.source))
            .sum::<f64>()
            / total_weight
    }
}

impl Default for PriceAggregator {
    fn default() -> Self {
        Self::new(SourceWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, Fiat};

    fn quote(source: Source, price: f64) -> Quote {
        Quote::new(source, price)
    }

    fn snapshot(quotes: Vec<Quote>, attempted: usize) -> Snapshot {
        Snapshot::from_quotes(Asset::BTC, Fiat::USD, quotes, attempted)
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_deviation_is_around_median() {
        // Around the median 2.0, not the mean 3.0
        let values = [1.0, 2.0, 6.0];
        let dev = deviation_around(&values, 2.0);
        assert!((dev - (17.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(deviation_around(&[5.0, 5.0], 5.0), 0.0);
    }

    #[test]
    fn test_single_outlier_is_rejected() {
        let aggregator = PriceAggregator::default();
        let result = aggregator
            .aggregate(&snapshot(
                vec![
                    quote(Source::CoinGecko, 100.0),
                    quote(Source::CoinMarketCap, 101.0),
                    quote(Source::Binance, 102.0),
                    quote(Source::Kraken, 5000.0),
                ],
                4,
            ))
            .unwrap();

        assert!(!result.sources.contains(&Source::Kraken));
        assert_eq!(result.sources.len(), 3);
        assert!(result.price >= 100.0 && result.price <= 102.0);
        // (100*0.3 + 101*0.3 + 102*0.2) / 0.8
        assert!((result.price - 100.875).abs() < 1e-9);
        assert!((result.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_two_disagreeing_quotes_both_survive() {
        let aggregator = PriceAggregator::default();
        let result = aggregator
            .aggregate(&snapshot(
                vec![quote(Source::Binance, 100.0), quote(Source::Kraken, 110.0)],
                4,
            ))
            .unwrap();
        assert_eq!(result.sources.len(), 2);
        assert!((result.price - 105.0).abs() < 1e-9);
        assert!((result.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_identical_quotes_all_pass() {
        let aggregator = PriceAggregator::default();
        let result = aggregator
            .aggregate(&snapshot(
                vec![
                    quote(Source::CoinGecko, 50.0),
                    quote(Source::CoinMarketCap, 50.0),
                    quote(Source::Kraken, 50.0),
                ],
                3,
            ))
            .unwrap();
        assert_eq!(result.sources.len(), 3);
        assert!((result.price - 50.0).abs() < 1e-9);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_agreeing_majority_rejects_one_off_quote() {
        let aggregator = PriceAggregator::default();
        let result = aggregator
            .aggregate(&snapshot(
                vec![
                    quote(Source::CoinGecko, 100.0),
                    quote(Source::CoinMarketCap, 100.0),
                    quote(Source::Binance, 100.0),
                    quote(Source::Kraken, 120.0),
                ],
                4,
            ))
            .unwrap();
        assert!((result.price - 100.0).abs() < 1e-9);
        assert!(!result.sources.contains(&Source::Kraken));
    }

    #[test]
    fn test_small_drift_from_agreeing_quotes_is_kept() {
        let aggregator = PriceAggregator::default();
        let result = aggregator
            .aggregate(&snapshot(
                vec![
                    quote(Source::CoinGecko, 100.0),
                    quote(Source::CoinMarketCap, 100.0),
                    quote(Source::Kraken, 100.01),
                ],
                3,
            ))
            .unwrap();
        assert_eq!(
            result.sources,
            vec![Source::CoinGecko, Source::CoinMarketCap, Source::Kraken]
        );
        assert_eq!(result.confidence, 1.0);

        // A far-off quote next to an exact pair is still an outlier
        let result = aggregator
            .aggregate(&snapshot(
                vec![
                    quote(Source::CoinGecko, 100.0),
                    quote(Source::CoinMarketCap, 100.0),
                    quote(Source::Kraken, 5000.0),
                ],
                3,
            ))
            .unwrap();
        assert_eq!(result.sources, vec![Source::CoinGecko, Source::CoinMarketCap]);

        let result = aggregator
            .aggregate(&snapshot(
                vec![
                    quote(Source::CoinGecko, 100.0),
                    quote(Source::CoinMarketCap, 101.0),
                    quote(Source::Binance, 102.0),
                    quote(Source::Kraken, 5000.0),
                ],
                4,
            ))
            .unwrap();
        assert!(!result.sources.contains(&Source::Kraken));
    }

    #[test]
    fn test_insufficient_sources() {
        let aggregator = PriceAggregator::default();

        let err = aggregator
            .aggregate(&snapshot(vec![quote(Source::CoinGecko, 100.0)], 4))
            .unwrap_err();
        assert_eq!(
            err,
            OracleError::InsufficientSources {
                available: 1,
                required: 2
            }
        );

        let err = aggregator.aggregate(&snapshot(Vec::new(), 4)).unwrap_err();
        assert!(matches!(err, OracleError::InsufficientSources { available: 0, .. }));

        // One sane quote left after the bound check
        let err = aggregator
            .aggregate(&snapshot(
                vec![quote(Source::CoinGecko, 100.0), quote(Source::Kraken, -3.0)],
                2,
            ))
            .unwrap_err();
        assert!(matches!(err, OracleError::InsufficientSources { available: 1, .. }));
    }

    #[test]
    fn test_out_of_bound_quotes_give_invalid_aggregate() {
        let aggregator = PriceAggregator::default();

        let err = aggregator
            .aggregate(&snapshot(
                vec![
                    quote(Source::CoinGecko, 2_000_000.0),
                    quote(Source::Kraken, 2_000_000.0),
                ],
                2,
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            OracleError::InvalidAggregate { price } if (price - 2_000_000.0).abs() < 1e-6
        ));

        let err = aggregator
            .aggregate(&snapshot(
                vec![quote(Source::CoinGecko, 0.0), quote(Source::Kraken, -1.0)],
                2,
            ))
            .unwrap_err();
        assert!(matches!(err, OracleError::InvalidAggregate { .. }));
    }

    #[test]
    fn test_auxiliary_fields_come_from_reference_only() {
        let aggregator = PriceAggregator::default();
        let gecko = quote(Source::CoinGecko, 10.0).with_market_data(
            Some(1.5),
            Some(1_000.0),
            Some(200.0),
            Some(100.0),
        );
        let cmc = quote(Source::CoinMarketCap, 10.0).with_market_data(
            Some(9.0),
            Some(9_000.0),
            None,
            None,
        );

        let result = aggregator
            .aggregate(&snapshot(vec![gecko, cmc.clone()], 2))
            .unwrap();
        assert_eq!(result.change_pct_24h, Some(1.5));
        assert_eq!(result.market_cap, Some(1_000.0));
        assert_eq!(result.circulating, Some(100.0));

        // Reference source absent: fields stay empty
        let result = aggregator
            .aggregate(&snapshot(vec![cmc, quote(Source::Kraken, 10.0)], 2))
            .unwrap();
        assert_eq!(result.change_pct_24h, None);
        assert_eq!(result.market_cap, None);
    }

    #[test]
    fn test_weights_shape_the_price() {
        let weights = SourceWeights::default().with_weight(Source::Kraken, 0.9);
        let aggregator = PriceAggregator::new(weights);
        let result = aggregator
            .aggregate(&snapshot(
                vec![quote(Source::Binance, 100.0), quote(Source::Kraken, 110.0)],
                2,
            ))
            .unwrap();
        // (100*0.2 + 110*0.9) / 1.1
        assert!((result.price - 108.181_818_181_818).abs() < 1e-9);

        let fallback = SourceWeights::default().with_weight(Source::Binance, -1.0);
        assert_eq!(fallback.weight(Source::Binance), DEFAULT_SOURCE_WEIGHT);
    }

    #[test]
    fn test_price_stays_within_survivor_range() {
        let aggregator = PriceAggregator::default();
        let sets: [[f64; 4]; 4] = [
            [1.0, 1.1, 0.9, 1.05],
            [0.0021, 0.0022, 0.0020, 0.5],
            [64000.0, 64100.0, 63950.0, 64020.0],
            [10.0, 30.0, 20.0, 25.0],
        ];

        for prices in sets {
            let quotes: Vec<Quote> = Source::ALL
                .iter()
                .zip(prices)
                .map(|(s, p)| quote(*s, p))
                .collect();
            let result = aggregator.aggregate(&snapshot(quotes.clone(), 4)).unwrap();

            let surviving: Vec<f64> = quotes
                .iter()
                .filter(|q| result.sources.contains(&q.source))
                .map(|q| q.price)
                .collect();
            let min = surviving.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = surviving.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(result.price >= min && result.price <= max);
            assert!(result.confidence > 0.0 && result.confidence <= 1.0);
            assert_eq!(
                result.confidence,
                result.sources.len() as f64 / 4.0
            );
        }
    }
}
