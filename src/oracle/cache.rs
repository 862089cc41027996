//! Last-good consensus cache with a staleness ceiling.
//!
//! The key space is the static asset × fiat matrix, so nothing is ever
//! evicted; entries are only judged stale at read time.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::{Asset, ConsensusResult, Fiat};

/// Default maximum age of a fallback entry
pub const DEFAULT_STALENESS_SECS: i64 = 3_600;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub result: ConsensusResult,
    pub inserted_at: DateTime<Utc>,
}

/// Cache of the last successful consensus per (asset, fiat)
#[derive(Debug)]
pub struct QuoteCache {
    entries: RwLock<HashMap<(Asset, Fiat), CacheEntry>>,
    /// Entries at least this old are not served
    staleness: Duration,
}

impl QuoteCache {
    pub fn new(staleness: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            staleness,
        }
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    /// Record a successful consensus
    pub async fn store(&self, result: ConsensusResult) {
        self.store_at(result, Utc::now()).await;
    }

    /// Record a consensus with an explicit insertion time. A result older
    /// than the one already cached is ignored.
    pub async fn store_at(&self, result: ConsensusResult, inserted_at: DateTime<Utc>) {
        let key = (result.asset, result.fiat);
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(&key) {
            if existing.result.timestamp > result.timestamp {
                tracing::debug!(asset = %result.asset, fiat = %result.fiat, "Keeping newer cached consensus");
                return;
            }
        }

        entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at,
            },
        );
    }

    /// Cached result still inside the staleness window, if any
    pub async fn fallback(&self, asset: Asset, fiat: Fiat) -> Option<ConsensusResult> {
        let entries = self.entries.read().await;
        let entry = entries.get(&(asset, fiat))?;

        if Utc::now() - entry.inserted_at < self.staleness {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    /// Raw entry regardless of age
    pub async fn entry(&self, asset: Asset, fiat: Fiat) -> Option<CacheEntry> {
        self.entries.read().await.get(&(asset, fiat)).cloned()
    }

    /// Age of the cached entry
    pub async fn age(&self, asset: Asset, fiat: Fiat) -> Option<Duration> {
        self.entries
            .read()
            .await
            .get(&(asset, fiat))
            .map(|e| Utc::now() - e.inserted_at)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_STALENESS_SECS))
    }
}
