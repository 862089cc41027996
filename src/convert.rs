//! Amount conversion at a consensus price
//!
//! Crypto → fiat results are rounded to cents, fiat → crypto to 8 decimal
//! places (one satoshi).

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

use crate::types::is_sane_price;

/// Longest amount accepted, counted in digits
pub const MAX_INPUT_DIGITS: usize = 32;

pub const FIAT_DECIMALS: u32 = 2;
pub const CRYPTO_DECIMALS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertDirection {
    /// Crypto amount in, fiat value out
    ToFiat,
    /// Fiat amount in, crypto quantity out
    ToCrypto,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("amount has {digits} digits, at most {MAX_INPUT_DIGITS} allowed")]
    InputTooLong { digits: usize },

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("price {0} is not usable for conversion")]
    InvalidPrice(f64),
}

/// Convert `amount` at `price` (fiat per one unit of crypto)
pub fn convert(price: f64, amount: &str, direction: ConvertDirection) -> Result<Decimal, ConvertError> {
    let amount = amount.trim();

    let digits = amount.chars().filter(|c| c.is_ascii_digit()).count();
    if digits > MAX_INPUT_DIGITS {
        return Err(ConvertError::InputTooLong { digits });
    }

    if !is_sane_price(price) {
        return Err(ConvertError::InvalidPrice(price));
    }
    let price = Decimal::from_f64(price).ok_or(ConvertError::InvalidPrice(price))?;

    let value = Decimal::from_str(amount).map_err(|_| ConvertError::InvalidAmount(amount.to_string()))?;
    if value.is_sign_negative() {
        return Err(ConvertError::InvalidAmount(amount.to_string()));
    }

    let (converted, decimals) = match direction {
        ConvertDirection::ToFiat => (value.checked_mul(price), FIAT_DECIMALS),
        ConvertDirection::ToCrypto => (value.checked_div(price), CRYPTO_DECIMALS),
    };
    let converted = converted.ok_or_else(|| ConvertError::InvalidAmount(amount.to_string()))?;

    Ok(converted.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
}
