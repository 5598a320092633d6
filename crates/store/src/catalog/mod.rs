//! Remote catalog source.
//!
//! # Architecture
//!
//! - The store only sees the [`CatalogSource`] trait; the remote endpoint is
//!   opaque to it
//! - [`HttpCatalogClient`] issues exactly one `GET {base_url}/products` per
//!   call with `reqwest` - no caching, no retries
//! - Failures are returned to the caller; retrying is the caller's decision
//!
//! # Example
//!
//! ```rust,ignore
//! use pocket_shop_store::catalog::{CatalogSource, HttpCatalogClient};
//!
//! let client = HttpCatalogClient::new(&config.catalog)?;
//! let products = client.fetch_products().await?;
//! ```

mod client;

pub use client::HttpCatalogClient;

use async_trait::async_trait;
use pocket_shop_core::Product;
use thiserror::Error;

/// Maximum number of response body characters kept in errors.
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors that can occur when reading the remote catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("Catalog returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// The response body was not an array of products.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The catalog endpoint URL could not be built.
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl CatalogError {
    /// Build a status error, keeping only the start of the body.
    #[must_use]
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: excerpt(body, BODY_EXCERPT_CHARS),
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// A read-only source of catalog products.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Read the full product list.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the source is unreachable or answers with
    /// something that is not a product list.
    async fn fetch_products(&self) -> Result<Vec<Product>, CatalogError>;
}
