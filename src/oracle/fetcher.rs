//! Snapshot fetcher - concurrent fan-out to every applicable source

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchError;
use crate::oracle::sources::PriceSource;
use crate::oracle::Snapshot;
use crate::types::{Asset, Fiat, PriceSource as Source};

/// Runs all applicable adapters in parallel and collects whatever succeeds
pub struct SnapshotFetcher {
    sources: Vec<Arc<dyn PriceSource>>,
    /// Ceiling on each adapter call, on top of the adapter's own HTTP timeout
    timeout: Duration,
}

impl SnapshotFetcher {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Configured source kinds, in dispatch order
    pub fn source_kinds(&self) -> Vec<Source> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Number of adapters that would be dispatched for this pair
    pub fn applicable(&self, asset: Asset, fiat: Fiat) -> usize {
        self.sources
            .iter()
            .filter(|s| s.supports(asset, fiat))
            .count()
    }

    /// Fetch one snapshot. Never fails; an empty snapshot is a valid outcome.
    pub async fn fetch(&self, asset: Asset, fiat: Fiat) -> Snapshot {
        let mut kinds = Vec::new();
        let mut handles = Vec::new();

        for source in self.sources.iter().filter(|s| s.supports(asset, fiat)) {
            let source = Arc::clone(source);
            let kind = source.kind();
            let timeout = self.timeout;

            kinds.push(kind);
            handles.push(tokio::spawn(async move {
                match tokio::time::timeout(timeout, source.fetch_quote(asset, fiat)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout { provider: kind }),
                }
            }));
        }

        let mut snapshot = Snapshot::new(asset, fiat, handles.len());

        for (kind, outcome) in kinds.into_iter().zip(join_all(handles).await) {
            match outcome {
                Ok(Ok(quote)) => {
                    if snapshot.quotes.iter().any(|q| q.source == quote.source) {
                        tracing::warn!(source = %kind, "Duplicate quote for source, keeping the first");
                        continue;
                    }
                    tracing::debug!(source = %kind, asset = %asset, fiat = %fiat, price = quote.price, "Quote received");
                    snapshot.quotes.push(quote);
                }
                Ok(Err(e)) => {
                    tracing::warn!(source = %kind, asset = %asset, fiat = %fiat, error = %e, "Source fetch failed");
                    snapshot.failures.push(e);
                }
                Err(e) => {
                    tracing::error!(source = %kind, error = %e, "Source task aborted");
                    snapshot.failures.push(FetchError::Network {
                        provider: kind,
                        message: format!("task aborted: {}", e),
                    });
                }
            }
        }

        tracing::debug!(
            asset = %asset,
            fiat = %fiat,
            attempted = snapshot.attempted,
            succeeded = snapshot.quotes.len(),
            "Snapshot collected"
        );

        snapshot
    }
}
