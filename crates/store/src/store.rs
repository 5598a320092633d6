//! The product store.
//!
//! Single source of truth for product data shown by independent views. It
//! owns three collections:
//!
//! - the remote portion of the catalog, replaced wholesale by each
//!   successful fetch
//! - the created-products ledger, append-only and never touched by fetches
//! - the cart
//!
//! and publishes a catalog snapshot (remote products followed by the ledger)
//! and a cart snapshot through one [`Hub`], so catalog and cart publications
//! share a single total order.
//!
//! # Example
//!
//! ```rust,ignore
//! use pocket_shop_store::{HttpCatalogClient, ProductStore};
//!
//! let store = ProductStore::new(HttpCatalogClient::new(&config.catalog)?);
//!
//! let _catalog = store.subscribe_catalog(|snapshot| render(snapshot));
//! store.fetch_catalog().await?;
//! store.add_to_cart(product);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use pocket_shop_core::{Product, ProductId};
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogError, CatalogSource};
use crate::publish::{Channel, Hub, Subscription};

/// Merged catalog view: remote products followed by locally created ones.
pub type CatalogSnapshot = Arc<[Product]>;

/// Cart contents at a point in time.
pub type CartSnapshot = Arc<[Product]>;

/// Store for catalog, created products, and cart.
///
/// This struct is cheaply cloneable via `Arc`; every clone is the same store.
#[derive(Clone)]
pub struct ProductStore {
    inner: Arc<ProductStoreInner>,
}

struct ProductStoreInner {
    source: Box<dyn CatalogSource>,
    state: Mutex<StoreState>,
    hub: Hub<Arc<[Product]>>,
}

struct StoreState {
    remote: Vec<Product>,
    created: Vec<Product>,
    cart: Vec<Product>,
    /// Last published catalog snapshot.
    catalog: CatalogSnapshot,
    /// Last published cart snapshot.
    cart_snapshot: CartSnapshot,
}

impl StoreState {
    fn new() -> Self {
        Self {
            remote: Vec::new(),
            created: Vec::new(),
            cart: Vec::new(),
            catalog: Arc::from(Vec::new()),
            cart_snapshot: Arc::from(Vec::new()),
        }
    }

    fn rebuild_catalog(&mut self) -> CatalogSnapshot {
        let merged: Vec<Product> = self
            .remote
            .iter()
            .chain(self.created.iter())
            .cloned()
            .collect();
        self.catalog = Arc::from(merged);
        Arc::clone(&self.catalog)
    }

    fn rebuild_cart(&mut self) -> CartSnapshot {
        self.cart_snapshot = Arc::from(self.cart.as_slice());
        Arc::clone(&self.cart_snapshot)
    }
}

impl ProductStore {
    /// Create an empty store reading its catalog from `source`.
    #[must_use]
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self {
            inner: Arc::new(ProductStoreInner {
                source: Box::new(source),
                state: Mutex::new(StoreState::new()),
                hub: Hub::new(),
            }),
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Read the remote catalog and publish the merged snapshot.
    ///
    /// Each call performs its own read. On success the remote portion of the
    /// catalog is replaced, the created-products ledger is appended, and the
    /// result is published to catalog observers and returned. Concurrent
    /// calls publish in the order they complete.
    ///
    /// # Errors
    ///
    /// Returns the source's `CatalogError`. The error goes to this caller
    /// only; the published snapshot and all observers are left as they were.
    #[instrument(skip(self))]
    pub async fn fetch_catalog(&self) -> Result<CatalogSnapshot, CatalogError> {
        let remote = match self.inner.source.fetch_products().await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "Catalog fetch failed, keeping last snapshot");
                return Err(e);
            }
        };
        let remote_count = remote.len();

        let snapshot = {
            let mut state = self.inner.state.lock();
            state.remote = remote;
            let snapshot = state.rebuild_catalog();
            self.inner.hub.publish(Channel::Catalog, Arc::clone(&snapshot));
            snapshot
        };
        self.inner.hub.drain();

        info!(remote = remote_count, total = snapshot.len(), "Catalog fetched");
        Ok(snapshot)
    }

    /// Observe catalog snapshots.
    ///
    /// `observer` is called right away with the current snapshot (empty
    /// before the first fetch) and then with every later one, in publish
    /// order, until the returned [`Subscription`] is dropped.
    pub fn subscribe_catalog(
        &self,
        observer: impl FnMut(&CatalogSnapshot) + Send + 'static,
    ) -> Subscription {
        self.subscribe(Channel::Catalog, observer)
    }

    /// Last published catalog snapshot.
    #[must_use]
    pub fn catalog(&self) -> CatalogSnapshot {
        Arc::clone(&self.inner.state.lock().catalog)
    }

    /// First product in the current catalog with the given ID.
    #[must_use]
    pub fn find_product(&self, id: ProductId) -> Option<Product> {
        self.inner
            .state
            .lock()
            .catalog
            .iter()
            .find(|product| product.id == id)
            .cloned()
    }

    // =========================================================================
    // Created products
    // =========================================================================

    /// Append `product` to the created-products ledger and publish the new
    /// catalog snapshot. The remote portion is unchanged.
    #[instrument(skip_all, fields(title = %product.title))]
    pub fn create_product(&self, product: Product) {
        {
            let mut state = self.inner.state.lock();
            state.created.push(product);
            let snapshot = state.rebuild_catalog();
            self.inner.hub.publish(Channel::Catalog, snapshot);
        }
        self.inner.hub.drain();
        debug!("Product created");
    }

    /// Copy of the created-products ledger, in creation order.
    #[must_use]
    pub fn list_created_products(&self) -> Vec<Product> {
        self.inner.state.lock().created.clone()
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Append `product` to the cart and publish the new cart snapshot.
    ///
    /// Adding the same product twice keeps both entries.
    #[instrument(skip_all, fields(product_id = %product.id))]
    pub fn add_to_cart(&self, product: Product) {
        {
            let mut state = self.inner.state.lock();
            state.cart.push(product);
            let snapshot = state.rebuild_cart();
            self.inner.hub.publish(Channel::Cart, snapshot);
        }
        self.inner.hub.drain();
        debug!("Added to cart");
    }

    /// Remove the first cart entry equal to `product` and publish the new
    /// cart snapshot.
    ///
    /// Returns `false`, without publishing, if no entry matches. Only one
    /// entry is removed when the product was added several times.
    #[instrument(skip_all, fields(product_id = %product.id))]
    pub fn remove_from_cart(&self, product: &Product) -> bool {
        {
            let mut state = self.inner.state.lock();
            let Some(index) = state.cart.iter().position(|item| item == product) else {
                debug!("Product not in cart");
                return false;
            };
            state.cart.remove(index);
            let snapshot = state.rebuild_cart();
            self.inner.hub.publish(Channel::Cart, snapshot);
        }
        self.inner.hub.drain();
        debug!("Removed from cart");
        true
    }

    /// Observe cart snapshots; same contract as [`Self::subscribe_catalog`].
    pub fn subscribe_cart(
        &self,
        observer: impl FnMut(&CartSnapshot) + Send + 'static,
    ) -> Subscription {
        self.subscribe(Channel::Cart, observer)
    }

    /// Current cart contents, in insertion order.
    #[must_use]
    pub fn list_cart(&self) -> Vec<Product> {
        self.inner.state.lock().cart.clone()
    }

    fn subscribe(
        &self,
        channel: Channel,
        observer: impl FnMut(&Arc<[Product]>) + Send + 'static,
    ) -> Subscription {
        let subscription = {
            // Hold the state lock so no publication slips in between reading
            // the current snapshot and registering.
            let state = self.inner.state.lock();
            let current = match channel {
                Channel::Catalog => Arc::clone(&state.catalog),
                Channel::Cart => Arc::clone(&state.cart_snapshot),
            };
            self.inner.hub.subscribe(channel, current, observer)
        };
        self.inner.hub.drain();
        subscription
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use pocket_shop_core::{Price, Rating};
    use rust_decimal::Decimal;
    use tokio::sync::oneshot;

    use super::*;

    // =========================================================================
    // Test Sources
    // =========================================================================

    /// Answers each fetch with the next scripted response.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<Product>, CatalogError>>>,
    }

    impl ScriptedSource {
        fn with(responses: Vec<Result<Vec<Product>, CatalogError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for ScriptedSource {
        async fn fetch_products(&self) -> Result<Vec<Product>, CatalogError> {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(CatalogError::status(500, "script exhausted")))
        }
    }

    /// Each fetch waits on the next channel; the test decides when it completes.
    #[derive(Clone, Default)]
    struct GatedSource {
        gates: Arc<Mutex<VecDeque<oneshot::Receiver<Vec<Product>>>>>,
        calls: Arc<Mutex<usize>>,
    }

    impl GatedSource {
        fn gate(&self) -> oneshot::Sender<Vec<Product>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().push_back(rx);
            tx
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl CatalogSource for GatedSource {
        async fn fetch_products(&self) -> Result<Vec<Product>, CatalogError> {
            let gate = self.gates.lock().pop_front();
            *self.calls.lock() += 1;
            match gate {
                Some(rx) => rx
                    .await
                    .map_err(|_| CatalogError::status(503, "gate dropped")),
                None => Err(CatalogError::status(500, "no gate")),
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn product(id: i32, title: &str) -> Product {
        Product {
            id: ProductId::new(id),
            title: title.to_string(),
            price: Price::new(Decimal::new(1999, 2)).unwrap(),
            description: format!("{title} description"),
            category: "electronics".to_string(),
            image: format!("https://img.example.com/{id}.png"),
            rating: Rating {
                rate: Decimal::new(42, 1),
                count: 10,
            },
        }
    }

    type Seen = Arc<Mutex<Vec<Vec<Product>>>>;

    fn recorder() -> (Seen, impl FnMut(&Arc<[Product]>) + Send + 'static) {
        let seen = Seen::default();
        let sink = Arc::clone(&seen);
        (seen, move |snapshot: &Arc<[Product]>| {
            sink.lock().push(snapshot.to_vec());
        })
    }

    fn titles(snapshot: &[Product]) -> Vec<&str> {
        snapshot.iter().map(|p| p.title.as_str()).collect()
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    #[tokio::test]
    async fn test_created_product_follows_remote_items() {
        let remote = product(1, "Backpack");
        let store = ProductStore::new(ScriptedSource::with(vec![Ok(vec![remote.clone()])]));

        store.fetch_catalog().await.unwrap();
        let created = product(0, "X");
        store.create_product(created.clone());

        assert_eq!(store.catalog().to_vec(), vec![remote, created]);
    }

    #[tokio::test]
    async fn test_snapshot_is_latest_fetch_then_all_created_in_order() {
        let store = ProductStore::new(ScriptedSource::with(vec![
            Ok(vec![product(1, "old")]),
            Ok(vec![product(2, "new-a"), product(3, "new-b")]),
        ]));

        store.fetch_catalog().await.unwrap();
        store.create_product(product(0, "c1"));
        store.create_product(product(0, "c2"));
        let snapshot = store.fetch_catalog().await.unwrap();
        store.create_product(product(0, "c3"));

        assert_eq!(titles(&snapshot), vec!["new-a", "new-b", "c1", "c2"]);
        assert_eq!(
            titles(&store.catalog()),
            vec!["new-a", "new-b", "c1", "c2", "c3"]
        );
    }

    #[tokio::test]
    async fn test_create_before_any_fetch_publishes_ledger_only() {
        let store = ProductStore::new(ScriptedSource::default());
        let (seen, observer) = recorder();
        let _sub = store.subscribe_catalog(observer);

        store.create_product(product(0, "draft"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_empty());
        assert_eq!(titles(&seen[1]), vec!["draft"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_published_state_untouched() {
        let store = ProductStore::new(ScriptedSource::with(vec![
            Ok(vec![product(1, "Backpack")]),
            Err(CatalogError::status(502, "bad gateway")),
        ]));
        store.fetch_catalog().await.unwrap();
        store.create_product(product(0, "mine"));

        let (seen, observer) = recorder();
        let _sub = store.subscribe_catalog(observer);
        let before = store.catalog();
        let ledger_before = store.list_created_products();

        let err = store.fetch_catalog().await.unwrap_err();

        assert!(matches!(err, CatalogError::Status { status: 502, .. }));
        assert_eq!(store.catalog(), before);
        assert_eq!(store.list_created_products(), ledger_before);
        // Only the welcome snapshot; the failure published nothing.
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_first_fetch_keeps_empty_catalog() {
        let store = ProductStore::new(ScriptedSource::with(vec![Err(CatalogError::status(
            503, "down",
        ))]));

        assert!(store.fetch_catalog().await.is_err());
        assert!(store.catalog().is_empty());
        assert!(store.list_created_products().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_publishes_with_no_subscribers() {
        let store = ProductStore::new(ScriptedSource::with(vec![Ok(vec![product(1, "a")])]));

        let snapshot = store.fetch_catalog().await.unwrap();

        assert_eq!(titles(&snapshot), vec!["a"]);
        assert_eq!(store.catalog(), snapshot);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_latest_snapshot_first() {
        let store = ProductStore::new(ScriptedSource::with(vec![Ok(vec![product(1, "a")])]));
        store.fetch_catalog().await.unwrap();
        store.create_product(product(0, "b"));
        store.create_product(product(0, "c"));

        let (seen, observer) = recorder();
        let _sub = store.subscribe_catalog(observer);
        store.create_product(product(0, "d"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(titles(&seen[0]), vec!["a", "b", "c"]);
        assert_eq!(titles(&seen[1]), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_subscribers_see_same_sequence() {
        let store = ProductStore::new(ScriptedSource::with(vec![Ok(vec![product(1, "a")])]));
        let (first, first_observer) = recorder();
        let (second, second_observer) = recorder();
        let _first = store.subscribe_catalog(first_observer);
        let _second = store.subscribe_catalog(second_observer);

        store.fetch_catalog().await.unwrap();
        store.create_product(product(0, "b"));

        assert_eq!(*first.lock(), *second.lock());
        assert_eq!(first.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_unsubscribe_only_affects_that_observer() {
        let store = ProductStore::new(ScriptedSource::default());
        let (gone, gone_observer) = recorder();
        let (kept, kept_observer) = recorder();
        let gone_sub = store.subscribe_catalog(gone_observer);
        let _kept_sub = store.subscribe_catalog(kept_observer);

        gone_sub.unsubscribe();
        store.create_product(product(0, "after"));

        assert_eq!(gone.lock().len(), 1);
        assert_eq!(kept.lock().len(), 2);
        assert_eq!(store.list_created_products().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_each_read_and_publish_in_completion_order() {
        let source = GatedSource::default();
        let first_gate = source.gate();
        let second_gate = source.gate();
        let store = ProductStore::new(source.clone());
        store.create_product(product(0, "mine"));

        let (seen, observer) = recorder();
        let _sub = store.subscribe_catalog(observer);

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_catalog().await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_catalog().await }
        });
        while source.calls() < 2 {
            tokio::task::yield_now().await;
        }

        // Complete the later read first.
        second_gate.send(vec![product(2, "B")]).unwrap();
        while seen.lock().len() < 2 {
            tokio::task::yield_now().await;
        }
        first_gate.send(vec![product(1, "A")]).unwrap();

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert!(results.iter().all(Result::is_ok));

        let seen = seen.lock();
        let published: Vec<Vec<&str>> = seen.iter().map(|s| titles(s)).collect();
        assert_eq!(
            published,
            vec![vec!["mine"], vec!["B", "mine"], vec!["A", "mine"]]
        );
        assert_eq!(titles(&store.catalog()), vec!["A", "mine"]);
    }

    #[tokio::test]
    async fn test_find_product_by_id() {
        let store = ProductStore::new(ScriptedSource::with(vec![Ok(vec![
            product(1, "a"),
            product(2, "b"),
        ])]));
        store.fetch_catalog().await.unwrap();

        assert_eq!(store.find_product(ProductId::new(2)).unwrap().title, "b");
        assert!(store.find_product(ProductId::new(9)).is_none());
    }

    // =========================================================================
    // Cart
    // =========================================================================

    #[test]
    fn test_cart_publishes_each_change() {
        let store = ProductStore::new(ScriptedSource::default());
        let (seen, observer) = recorder();
        let _sub = store.subscribe_cart(observer);
        let p1 = product(1, "p1");
        let p2 = product(2, "p2");

        store.add_to_cart(p1.clone());
        store.add_to_cart(p2.clone());
        assert!(store.remove_from_cart(&p1));

        assert_eq!(
            *seen.lock(),
            vec![vec![], vec![p1.clone()], vec![p1, p2.clone()], vec![p2]]
        );
    }

    #[test]
    fn test_add_then_remove_restores_cart() {
        let store = ProductStore::new(ScriptedSource::default());
        let kept = product(1, "kept");
        store.add_to_cart(kept.clone());
        let before = store.list_cart();

        let temporary = product(2, "temporary");
        store.add_to_cart(temporary.clone());
        assert!(store.remove_from_cart(&temporary));

        assert_eq!(store.list_cart(), before);
    }

    #[test]
    fn test_remove_absent_product_is_silent_no_op() {
        let store = ProductStore::new(ScriptedSource::default());
        store.add_to_cart(product(1, "in cart"));
        let (seen, observer) = recorder();
        let _sub = store.subscribe_cart(observer);

        assert!(!store.remove_from_cart(&product(2, "never added")));

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(store.list_cart().len(), 1);
    }

    #[test]
    fn test_remove_takes_first_duplicate_only() {
        let store = ProductStore::new(ScriptedSource::default());
        let twice = product(1, "twice");
        let other = product(2, "other");
        store.add_to_cart(twice.clone());
        store.add_to_cart(other.clone());
        store.add_to_cart(twice.clone());

        assert!(store.remove_from_cart(&twice));

        assert_eq!(store.list_cart(), vec![other, twice]);
    }

    #[test]
    fn test_remove_matches_full_equality_not_id() {
        let store = ProductStore::new(ScriptedSource::default());
        let original = product(0, "first draft");
        store.add_to_cart(original.clone());

        // Same (unassigned) ID, different product.
        assert!(!store.remove_from_cart(&product(0, "second draft")));
        assert!(store.remove_from_cart(&original));
        assert!(store.list_cart().is_empty());
    }

    #[test]
    fn test_cart_is_independent_of_catalog() {
        let store = ProductStore::new(ScriptedSource::default());
        let (catalog_seen, catalog_observer) = recorder();
        let _sub = store.subscribe_catalog(catalog_observer);

        store.add_to_cart(product(5, "not in catalog"));

        assert_eq!(catalog_seen.lock().len(), 1);
        assert!(store.catalog().is_empty());
        assert_eq!(store.list_cart().len(), 1);
    }

    // =========================================================================
    // Ordering and reentrancy
    // =========================================================================

    #[test]
    fn test_catalog_and_cart_share_one_order() {
        let store = ProductStore::new(ScriptedSource::default());
        let events: Arc<Mutex<Vec<String>>> = Arc::default();

        let log = |name: &'static str| {
            let events = Arc::clone(&events);
            move |snapshot: &Arc<[Product]>| {
                events.lock().push(format!("{name}:{}", snapshot.len()));
            }
        };
        let _catalog = store.subscribe_catalog(log("catalog"));
        let _cart = store.subscribe_cart(log("cart"));
        events.lock().clear();

        store.add_to_cart(product(1, "a"));
        store.create_product(product(0, "b"));
        store.add_to_cart(product(2, "c"));

        assert_eq!(*events.lock(), vec!["cart:1", "catalog:1", "cart:2"]);
    }

    #[test]
    fn test_observer_may_mutate_store() {
        let store = ProductStore::new(ScriptedSource::default());
        let (seen, observer) = recorder();
        let _cart = store.subscribe_cart(observer);

        // Every created product is dropped into the cart by a catalog observer.
        let _autocart = store.subscribe_catalog({
            let store = store.clone();
            move |snapshot: &Arc<[Product]>| {
                if let Some(last) = snapshot.last() {
                    store.add_to_cart(last.clone());
                }
            }
        });

        store.create_product(product(0, "auto"));

        assert_eq!(store.list_cart(), vec![product(0, "auto")]);
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_list_created_products_returns_copy() {
        let store = ProductStore::new(ScriptedSource::default());
        store.create_product(product(0, "one"));

        let mut copy = store.list_created_products();
        copy.clear();

        assert_eq!(store.list_created_products().len(), 1);
    }
}
