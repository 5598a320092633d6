//! Integration test harness for Pocket Shop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pocket-shop-integration-tests
//! ```
//!
//! Tests run a [`FakeCatalog`] HTTP server on an ephemeral localhost port and
//! point a real [`HttpCatalogClient`] at it, so the store is exercised over
//! actual HTTP without touching the public catalog.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use parking_lot::Mutex;
use pocket_shop_core::Product;
use pocket_shop_store::{CatalogConfig, HttpCatalogClient, ProductStore};
use url::Url;

/// What the fake catalog answers with.
#[derive(Debug, Clone)]
enum Reply {
    Products(Vec<Product>),
    Failure(StatusCode, String),
    Raw(String),
}

#[derive(Debug)]
struct FakeCatalogState {
    reply: Mutex<Reply>,
    hits: AtomicUsize,
}

/// A local stand-in for the remote catalog endpoint.
#[derive(Debug, Clone)]
pub struct FakeCatalog {
    base_url: Url,
    state: Arc<FakeCatalogState>,
}

impl FakeCatalog {
    /// Start serving `GET /products` with an empty product list.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Arc::new(FakeCatalogState {
            reply: Mutex::new(Reply::Products(Vec::new())),
            hits: AtomicUsize::new(0),
        });

        let router = Router::new()
            .route("/products", get(products))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake catalog");
        let addr = listener.local_addr().expect("Fake catalog has no address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let base_url = Url::parse(&format!("http://{addr}")).expect("Fake catalog URL is valid");
        Self { base_url, state }
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Answer subsequent requests with `products`.
    pub fn set_products(&self, products: Vec<Product>) {
        *self.state.reply.lock() = Reply::Products(products);
    }

    /// Answer subsequent requests with `status` and `body`.
    pub fn fail_with(&self, status: StatusCode, body: &str) {
        *self.state.reply.lock() = Reply::Failure(status, body.to_string());
    }

    /// Answer subsequent requests with a raw 200 body.
    pub fn reply_raw(&self, body: &str) {
        *self.state.reply.lock() = Reply::Raw(body.to_string());
    }

    /// Number of requests served so far.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// A store wired to this catalog through the real HTTP client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn store(&self) -> ProductStore {
        let client = HttpCatalogClient::new(&CatalogConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(5),
        })
        .expect("Failed to build catalog client");
        ProductStore::new(client)
    }
}

async fn products(State(state): State<Arc<FakeCatalogState>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let reply = state.reply.lock().clone();
    match reply {
        Reply::Products(products) => axum::Json(products).into_response(),
        Reply::Failure(status, body) => (status, body).into_response(),
        Reply::Raw(body) => body.into_response(),
    }
}

/// Build a catalog-shaped product from a compact JSON object.
///
/// # Panics
///
/// Panics if `json` is not a valid product.
#[must_use]
pub fn product(json: &serde_json::Value) -> Product {
    serde_json::from_value(json.clone()).expect("Invalid test product")
}

/// A complete product with the given ID and title.
#[must_use]
pub fn sample_product(id: i32, title: &str) -> Product {
    product(&serde_json::json!({
        "id": id,
        "title": title,
        "price": 19.99,
        "description": format!("{title} description"),
        "category": "electronics",
        "image": format!("https://img.example.com/{id}.png"),
        "rating": { "rate": 4.2, "count": 10 }
    }))
}
