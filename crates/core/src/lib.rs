//! Pocket Shop Core - Shared product types.
//!
//! This crate provides the value types used across all Pocket Shop components:
//! - `store` - Catalog client and the product store
//! - `cli` - Command-line composition root
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no shared
//! state. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, non-negative prices, ratings, and products

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
