//! Oracle module - Multi-source price consensus
//!
//! Fetches quotes from CoinGecko, CoinMarketCap, Binance and Kraken
//! concurrently, rejects outliers, and produces a weighted consensus price
//! with a confidence score. The last good consensus per pair is cached as a
//! stale fallback.

mod aggregator;
mod cache;
mod fetcher;
mod service;
pub mod sources;

pub use aggregator::{deviation_around, median, PriceAggregator, SourceWeights, MIN_SOURCES};
pub use cache::{CacheEntry, QuoteCache};
pub use fetcher::SnapshotFetcher;
pub use service::PriceOracle;

use crate::error::FetchError;
use crate::types::{Asset, Fiat, Quote};

/// Quotes gathered for one request, at most one per source
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub asset: Asset,
    pub fiat: Fiat,
    pub quotes: Vec<Quote>,
    /// Adapters dispatched for this pair, failed ones included
    pub attempted: usize,
    pub failures: Vec<FetchError>,
}

impl Snapshot {
    pub fn new(asset: Asset, fiat: Fiat, attempted: usize) -> Self {
        Self {
            asset,
            fiat,
            quotes: Vec::new(),
            attempted,
            failures: Vec::new(),
        }
    }

    /// Build a snapshot from already-fetched quotes
    pub fn from_quotes(asset: Asset, fiat: Fiat, quotes: Vec<Quote>, attempted: usize) -> Self {
        Self {
            asset,
            fiat,
            quotes,
            attempted,
            failures: Vec::new(),
        }
    }
}
