//! Consensus Oracle Library
//!
//! Cross-validated spot prices for DOGEC, BTC, ETH and LTC from four public
//! market-data providers

pub mod config;
pub mod convert;
pub mod error;
pub mod oracle;
pub mod types;
