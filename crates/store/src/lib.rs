//! Pocket Shop product store.
//!
//! Reconciles a remotely fetched product catalog with locally created
//! products and a local cart, and republishes consistent snapshots to any
//! number of observers.
//!
//! # Modules
//!
//! - [`store`] - [`ProductStore`], the single source of truth for product data
//! - [`publish`] - Observer registry and ordered snapshot delivery
//! - [`catalog`] - [`CatalogSource`] trait and the HTTP catalog client
//! - [`config`] - Environment configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod publish;
pub mod store;

pub use catalog::{CatalogError, CatalogSource, HttpCatalogClient};
pub use config::{CatalogConfig, ConfigError, StoreConfig};
pub use publish::{Channel, Subscription, SubscriptionId};
pub use store::{CartSnapshot, CatalogSnapshot, ProductStore};
