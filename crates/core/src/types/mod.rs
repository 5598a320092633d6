//! Core types for Pocket Shop.
//!
//! This module provides type-safe wrappers for catalog concepts.

pub mod id;
pub mod price;
pub mod product;

pub use id::*;
pub use price::{Price, PriceError};
pub use product::{Product, ProductField, ProductValidationError, Rating};
