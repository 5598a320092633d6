//! Type-safe price representation using decimal arithmetic.
//!
//! The remote catalog sends prices as JSON numbers (`109.95`). They are kept
//! as [`Decimal`] so that equality between products is exact, and written
//! back out as numbers so the wire shape round-trips.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur when constructing a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),
}

/// A non-negative price in the catalog's currency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
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

    /// Get the underlying amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

// Sums of non-negative amounts stay non-negative.
impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|price| price.0).sum())
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_negative() {
        let err = Price::new(Decimal::new(-1, 2)).unwrap_err();
        assert_eq!(err, PriceError::Negative(Decimal::new(-1, 2)));
        assert_eq!(err.to_string(), "price cannot be negative (got -0.01)");
    }

    #[test]
    fn test_price_accepts_zero() {
        assert!(Price::new(Decimal::ZERO).unwrap().is_zero());
    }

    #[test]
    fn test_price_display() {
        let price = Price::new(Decimal::new(10995, 2)).unwrap();
        assert_eq!(price.to_string(), "$109.95");
    }

    #[test]
    fn test_price_sum() {
        let prices = [
            Price::new(Decimal::new(10995, 2)).unwrap(),
            Price::new(Decimal::new(2230, 2)).unwrap(),
        ];
        let total: Price = prices.iter().sum();
        assert_eq!(total.to_string(), "$132.25");
        assert_eq!(std::iter::empty::<Price>().sum::<Price>(), Price::ZERO);
    }

    #[test]
    fn test_price_deserializes_from_json_number() {
        let price: Price = serde_json::from_str("109.95").unwrap();
        assert_eq!(price.amount(), Decimal::new(10995, 2));

        let whole: Price = serde_json::from_str("22").unwrap();
        assert_eq!(whole.amount(), Decimal::new(22, 0));
    }

    #[test]
    fn test_price_deserialize_rejects_negative() {
        let result = serde_json::from_str::<Price>("-3.5");
        assert!(result.is_err());
    }
}
