//! Type-safe price representation using decimal arithmetic.
//!
//! The kiosk sells in Argentine pesos only, so a price is a bare non-negative
//! decimal amount. Formatting uses the `$` symbol with two decimal places,
//! matching the labels printed at the stand.

use core::fmt;
use core::ops::Mul;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),
}

/// A unit price in pesos.
///
/// ## Examples
///
/// ```
/// use am_popcorn_core::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::from(1500)).unwrap();
/// assert_eq!(price.to_string(), "$1500.00");
/// assert_eq!(price * 3, Decimal::from(4500));
///
/// assert!(Price::new(Decimal::from(-1)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a new price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// The zero price.
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

impl Mul<u32> for Price {
    type Output = Decimal;

    fn mul(self, quantity: u32) -> Decimal {
        self.0 * Decimal::from(quantity)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_amount(self.0))
    }
}

/// Format any peso amount the way prices are displayed (e.g. `$650.00`).
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_valid() {
        assert_eq!(Price::new(Decimal::ZERO).unwrap(), Price::zero());
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let result: Result<Price, _> = serde_json::from_str("\"-10\"");
        assert!(result.is_err());

        let price: Price = serde_json::from_str("\"150.50\"").unwrap();
        assert_eq!(price.amount(), Decimal::new(15050, 2));
    }

    #[test]
    fn test_deserialize_accepts_plain_numbers() {
        let price: Price = serde_json::from_str("1800").unwrap();
        assert_eq!(price.amount(), Decimal::from(1800));
    }

    #[test]
    fn test_format_amount_rounds_to_cents() {
        assert_eq!(format_amount(Decimal::new(3333, 1)), "$333.30");
        assert_eq!(format_amount(Decimal::from(650)), "$650.00");
    }
}
