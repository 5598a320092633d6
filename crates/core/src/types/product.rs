//! Catalog product type.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;
use super::price::Price;

/// Customer rating summary for a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rating {
    /// Average rating.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    /// Number of ratings the average is built from.
    pub count: u32,
}

/// A product as listed by the remote catalog or created locally.
///
/// Products are plain values: once published in a snapshot they are never
/// mutated, and two products are the same product when every field matches.
/// Locally created products have no server-assigned ID and use
/// `ProductId::default()` (0).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub description: String,
    pub category: String,
    /// Image URL.
    pub image: String,
    pub rating: Rating,
}

/// A required product field, named the way the product form labels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductField {
    Title,
    Price,
    Description,
    Category,
    Image,
    RatingRate,
    RatingCount,
}

impl ProductField {
    /// User-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Price => "Price",
            Self::Description => "Description",
            Self::Category => "Category",
            Self::Image => "Image URL",
            Self::RatingRate => "Rating Rate",
            Self::RatingCount => "Rating Count",
        }
    }
}

impl fmt::Display for ProductField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors returned by [`Product::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductValidationError {
    /// One or more required fields are blank or zero.
    #[error("Please fill in the following required fields: {}", join_fields(.0))]
    MissingFields(Vec<ProductField>),
}

fn join_fields(fields: &[ProductField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Product {
    /// Required fields that are blank (after trimming) or zero, in form order.
    ///
    /// The product store accepts any well-typed product; this check belongs
    /// to whatever layer collects products from a user.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<ProductField> {
        let checks = [
            (ProductField::Title, self.title.trim().is_empty()),
            (ProductField::Price, self.price.is_zero()),
            (ProductField::Description, self.description.trim().is_empty()),
            (ProductField::Category, self.category.trim().is_empty()),
            (ProductField::Image, self.image.trim().is_empty()),
            (ProductField::RatingRate, self.rating.rate.is_zero()),
            (ProductField::RatingCount, self.rating.count == 0),
        ];

        checks
            .into_iter()
            .filter_map(|(field, missing)| missing.then_some(field))
            .collect()
    }

    /// Check that every required field is filled in.
    ///
    /// # Errors
    ///
    /// Returns `ProductValidationError::MissingFields` listing each blank field.
    pub fn validate(&self) -> Result<(), ProductValidationError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProductValidationError::MissingFields(missing))
        }
    }
}
