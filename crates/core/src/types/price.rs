//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored as [`Decimal`] so that line totals and subtotals add up
//! exactly, but they travel over the wire as plain JSON numbers because that
//! is what the persisted cart snapshot has always contained.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a decimal number: {0}")]
    Invalid(String),
    /// The input is below zero.
    #[error("price cannot be negative")]
    Negative,
}

/// A unit price in the store's currency.
///
/// ## Examples
///
/// ```
/// use go_market_core::Price;
///
/// let price = Price::parse("19.99").unwrap();
/// assert_eq!(price.to_string(), "19.99");
/// assert_eq!((price * 2).to_string(), "39.98");
/// assert!(Price::parse("-1").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Parse a non-negative price from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a decimal number or is negative.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount = Decimal::from_str(s.trim()).map_err(|e| PriceError::Invalid(e.to_string()))?;
        if amount < Decimal::ZERO {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(Price::parse("10").unwrap().amount(), Decimal::from(10));
        assert_eq!(Price::parse(" 0.50 ").unwrap(), Price::from_cents(50));
        assert_eq!(Price::parse("0").unwrap(), Price::ZERO);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(Price::parse("ten"), Err(PriceError::Invalid(_))));
        assert_eq!(Price::parse("-0.01"), Err(PriceError::Negative));
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Price::from_cents(1999).to_string(), "19.99");
        assert_eq!(Price::new(Decimal::from(10)).to_string(), "10.00");
    }

    #[test]
    fn test_line_arithmetic_is_exact() {
        let price = Price::from_cents(10);
        let total: Price = [price * 1, price * 2].into_iter().sum();
        assert_eq!(total, Price::from_cents(30));
    }

    #[test]
    fn test_json_number_wire_format() {
        let price: Price = serde_json::from_str("10").unwrap();
        assert_eq!(price, Price::new(Decimal::from(10)));

        let price: Price = serde_json::from_str("19.99").unwrap();
        assert_eq!(price, Price::from_cents(1999));

        let json = serde_json::to_value(Price::from_cents(1999)).unwrap();
        assert!(json.is_number());
    }
}
