//! HTTP client for the remote product catalog.

use std::sync::Arc;

use async_trait::async_trait;
use pocket_shop_core::Product;
use reqwest::header::ACCEPT;
use tracing::{debug, instrument};
use url::Url;

use super::{BODY_EXCERPT_CHARS, CatalogError, CatalogSource, excerpt};
use crate::config::CatalogConfig;

/// Client for the remote catalog's REST endpoint.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCatalogClient {
    inner: Arc<HttpCatalogClientInner>,
}

struct HttpCatalogClientInner {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCatalogClient {
    /// Create a new catalog client.
    ///
    /// # Errors
    ///
    /// Returns an error if the products endpoint cannot be derived from the
    /// configured base URL or the HTTP client cannot be built.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let endpoint = products_endpoint(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCatalogClientInner { client, endpoint }),
        })
    }

    /// The URL every fetch reads from.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

/// Resolve `{base}/products`, treating the base as a directory.
fn products_endpoint(base: &Url) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("products")
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    #[instrument(skip(self), fields(endpoint = %self.inner.endpoint))]
    async fn fetch_products(&self) -> Result<Vec<Product>, CatalogError> {
        let response = self
            .inner
            .client
            .get(self.inner.endpoint.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();

        // Read the body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %excerpt(&body, BODY_EXCERPT_CHARS),
                "Catalog returned non-success status"
            );
            return Err(CatalogError::status(status.as_u16(), &body));
        }

        let products: Vec<Product> = match serde_json::from_str(&body) {
            Ok(products) => products,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %excerpt(&body, BODY_EXCERPT_CHARS),
                    "Failed to parse catalog response"
                );
                return Err(CatalogError::Parse(e));
            }
        };

        debug!(count = products.len(), "Catalog response decoded");
        Ok(products)
    }
}
