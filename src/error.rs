//! Error types

use thiserror::Error;

use crate::types::{Asset, Fiat, PriceSource};

/// Failure of a single source adapter. Always recovered by the fetcher.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("{provider} timed out")]
    Timeout { provider: PriceSource },

    #[error("{provider} returned HTTP {status}")]
    HttpStatus { provider: PriceSource, status: u16 },

    #[error("{provider} returned an unexpected payload: {reason}")]
    BadSchema {
        provider: PriceSource,
        reason: String,
    },

    #[error("{provider} does not support {asset}/{fiat}")]
    UnsupportedPair {
        provider: PriceSource,
        asset: Asset,
        fiat: Fiat,
    },

    #[error("{provider} has no API credential configured")]
    MissingCredential { provider: PriceSource },

    #[error("{provider} request failed: {message}")]
    Network {
        provider: PriceSource,
        message: String,
    },
}

impl FetchError {
    pub fn provider(&self) -> PriceSource {
        match self {
            FetchError::Timeout { provider }
            | FetchError::HttpStatus { provider, .. }
            | FetchError::BadSchema { provider, .. }
            | FetchError::UnsupportedPair { provider, .. }
            | FetchError::MissingCredential { provider }
            | FetchError::Network { provider, .. } => *provider,
        }
    }

    pub(crate) fn bad_schema(provider: PriceSource, reason: impl Into<String>) -> Self {
        FetchError::BadSchema {
            provider,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to callers of the oracle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Unsupported fiat: {0}")]
    UnsupportedFiat(String),

    #[error("Insufficient sources: {available} usable, {required} required")]
    InsufficientSources { available: usize, required: usize },

    #[error("Invalid aggregate price: {price}")]
    InvalidAggregate { price: f64 },
}

impl OracleError {
    /// Whether a cached result may stand in for this failure
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            OracleError::InsufficientSources { .. } | OracleError::InvalidAggregate { .. }
        )
    }
}

pub type OracleResult<T> = Result<T, OracleError>;
