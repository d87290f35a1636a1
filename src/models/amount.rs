use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use super::token::MAX_DECIMALS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),

    #[error("amount {amount} has more than {decimals} decimal places")]
    TooPrecise { amount: Decimal, decimals: u8 },

    #[error("amount {0} does not fit in the asset's base units")]
    Overflow(Decimal),

    #[error("{0} decimals exceeds the supported maximum of {MAX_DECIMALS}")]
    UnsupportedDecimals(u8),
}

/// Convert a whole-unit amount (e.g. `1.5`) into the asset's smallest unit.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount));
    }
    let scale = 10u64
        .checked_pow(u32::from(decimals))
        .map(Decimal::from)
        .ok_or(AmountError::Overflow(amount))?;
    let scaled = amount
        .checked_mul(scale)
        .ok_or(AmountError::Overflow(amount))?;
    if scaled.fract() != Decimal::ZERO {
        return Err(AmountError::TooPrecise { amount, decimals });
    }
    scaled.to_u64().ok_or(AmountError::Overflow(amount))
}

/// Convert base units back into a whole-unit decimal for display.
pub fn from_base_units(amount: u64, decimals: u8) -> Result<Decimal, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    Decimal::try_from_i128_with_scale(i128::from(amount), u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|_| AmountError::UnsupportedDecimals(decimals))
}
