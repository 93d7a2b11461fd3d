//! Cart engine.
//!
//! Wraps a [`CartState`] and keeps it consistent with the catalog store. Every
//! operation that touches stock talks to the store first and only changes the
//! local cart once the store has accepted the change, so a failed round trip
//! leaves the cart exactly as it was.
//!
//! The state sits behind an async mutex that is held across the store call.
//! One cart therefore never has two mutations in flight; a second request
//! against the same cart waits for the first to finish.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

use am_popcorn_core::{CartItem, CartState, CartTotals, DiscountRules, Product, ProductId};

use crate::catalog::{CatalogError, CatalogStore};

/// Errors returned by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("{name} is out of stock")]
    OutOfStock { product_id: ProductId, name: String },

    #[error("only {available} left of {name}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        available: u32,
    },

    #[error("invalid discount code: {0}")]
    InvalidDiscountCode(String),

    #[error("the cart is empty")]
    EmptyCart,

    #[error("could not update stock for {product_id}")]
    StockSyncFailed {
        product_id: ProductId,
        #[source]
        source: CatalogError,
    },

    #[error("checkout failed for {} product(s)", failed.len())]
    CheckoutFailed {
        failed: Vec<ProductId>,
        #[source]
        source: CatalogError,
    },
}

/// Knobs that change how the engine reconciles stock.
#[derive(Debug, Clone, Copy)]
pub struct CartSettings {
    /// Give reserved units back to the store when a line is removed or the
    /// cart is cleared.
    pub release_stock_on_remove: bool,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            release_stock_on_remove: true,
        }
    }
}

/// Read-only copy of a cart with its totals.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub state: CartState,
    pub totals: CartTotals,
}

/// What was bought in a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub items: Vec<CartItem>,
    pub discount_code: Option<String>,
    pub totals: CartTotals,
}

/// One shopper's cart.
pub struct CartEngine {
    store: Arc<dyn CatalogStore>,
    rules: Arc<DiscountRules>,
    settings: CartSettings,
    state: Mutex<CartState>,
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CartEngine {
    /// An empty cart backed by `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        rules: Arc<DiscountRules>,
        settings: CartSettings,
    ) -> Self {
        Self {
            store,
            rules,
            settings,
            state: Mutex::new(CartState::new()),
        }
    }

    /// Current items and totals.
    pub async fn snapshot(&self) -> CartSnapshot {
        let state = self.state.lock().await.clone();
        let totals = state.totals(&self.rules);
        CartSnapshot { state, totals }
    }

    /// Add one unit of `product`.
    ///
    /// Reserves the unit in the store before touching the cart.
    ///
    /// # Errors
    ///
    /// `OutOfStock` when `product` shows no stock or the store has none left;
    /// `StockSyncFailed` when the store write fails for any other reason.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_item(&self, product: Product) -> Result<(), CartError> {
        let mut state = self.state.lock().await;

        if !product.in_stock() {
            return Err(CartError::OutOfStock {
                product_id: product.id,
                name: product.name,
            });
        }

        let stock = match self.store.adjust_stock(&product.id, -1).await {
            Ok(stock) => stock,
            Err(CatalogError::InsufficientStock { .. }) => {
                return Err(CartError::OutOfStock {
                    product_id: product.id,
                    name: product.name,
                });
            }
            Err(source) => {
                return Err(CartError::StockSyncFailed {
                    product_id: product.id,
                    source,
                });
            }
        };

        state.add_one(product.with_stock(stock));
        tracing::debug!(stock, "item added");
        Ok(())
    }

    /// Remove the line for `id`. Absent ids are ignored.
    #[instrument(skip(self, id), fields(product_id = %id))]
    pub async fn remove_item(&self, id: &ProductId) {
        let mut state = self.state.lock().await;
        self.remove_locked(&mut state, id).await;
    }

    async fn remove_locked(&self, state: &mut CartState, id: &ProductId) {
        let quantity = state.quantity_of(id);
        if quantity == 0 {
            return;
        }
        if self.settings.release_stock_on_remove {
            self.release(id, quantity).await;
        }
        state.remove(id);
    }

    /// Set the quantity of an existing line.
    ///
    /// Absent ids are ignored; a quantity of zero or less removes the line.
    /// The difference to the current quantity is pushed to the store first.
    ///
    /// # Errors
    ///
    /// `InsufficientStock` when growing the line beyond what the cart's
    /// snapshot (or the store) has available; `StockSyncFailed` when the store
    /// write fails for any other reason.
    #[instrument(skip(self, id), fields(product_id = %id))]
    pub async fn update_item_quantity(
        &self,
        id: &ProductId,
        quantity: i64,
    ) -> Result<(), CartError> {
        let mut state = self.state.lock().await;

        let Some(item) = state.item(id) else {
            return Ok(());
        };
        if quantity <= 0 {
            self.remove_locked(&mut state, id).await;
            return Ok(());
        }

        let current = i64::from(item.quantity);
        let available = item.product.stock;
        let name = item.product.name.clone();
        let delta = quantity - current;
        if delta == 0 {
            return Ok(());
        }

        let insufficient = |available: u32| CartError::InsufficientStock {
            product_id: id.clone(),
            name: name.clone(),
            available,
        };
        if delta > i64::from(available) {
            return Err(insufficient(available));
        }
        let new_quantity = u32::try_from(quantity).map_err(|_| insufficient(available))?;

        let stock = match self.store.adjust_stock(id, -delta).await {
            Ok(stock) => stock,
            Err(CatalogError::InsufficientStock { available, .. }) => {
                return Err(insufficient(available));
            }
            Err(source) => {
                return Err(CartError::StockSyncFailed {
                    product_id: id.clone(),
                    source,
                });
            }
        };

        state.set_quantity(id, new_quantity, stock);
        Ok(())
    }

    /// Make `code` the active discount code.
    ///
    /// # Errors
    ///
    /// `InvalidDiscountCode` when no rule matches; the active code is kept.
    #[instrument(skip(self))]
    pub async fn apply_discount(&self, code: &str) -> Result<(), CartError> {
        let rule = self
            .rules
            .find(code)
            .ok_or_else(|| CartError::InvalidDiscountCode(code.trim().to_owned()))?;
        self.state
            .lock()
            .await
            .set_discount_code(Some(rule.code.clone()));
        Ok(())
    }

    /// Clear the active discount code.
    #[instrument(skip(self))]
    pub async fn remove_discount(&self) {
        self.state.lock().await.set_discount_code(None);
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) {
        let mut state = self.state.lock().await;
        self.release_all(&state).await;
        state.clear();
    }

    /// Give back everything this cart holds; used when an idle cart expires.
    pub(crate) async fn abandon(&self) {
        let mut state = self.state.lock().await;
        self.release_all(&state).await;
        state.clear();
    }

    async fn release_all(&self, state: &CartState) {
        if !self.settings.release_stock_on_remove {
            return;
        }
        let releases = state
            .items()
            .iter()
            .map(|item| self.release(&item.id, item.quantity));
        join_all(releases).await;
    }

    async fn release(&self, id: &ProductId, quantity: u32) {
        if let Err(e) = self.store.adjust_stock(id, i64::from(quantity)).await {
            tracing::warn!(product_id = %id, quantity, error = %e, "failed to release stock");
        }
    }

    /// Buy everything in the cart.
    ///
    /// Every line is checked against its snapshot stock, then one decrement
    /// per line is sent to the store concurrently. If all succeed the cart is
    /// cleared and the receipt returned. If any fails the cart is left as is;
    /// decrements that did succeed are not rolled back.
    ///
    /// # Errors
    ///
    /// `EmptyCart` (store untouched), `InsufficientStock` for the first short
    /// line (store untouched), or `CheckoutFailed`.
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> Result<CheckoutReceipt, CartError> {
        let mut state = self.state.lock().await;

        if state.is_empty() {
            return Err(CartError::EmptyCart);
        }
        if let Some(item) = state.first_short_item() {
            return Err(CartError::InsufficientStock {
                product_id: item.id.clone(),
                name: item.product.name.clone(),
                available: item.product.stock,
            });
        }

        let decrements = state.items().iter().map(|item| async move {
            self.store
                .adjust_stock(&item.id, -i64::from(item.quantity))
                .await
                .map_err(|e| (item.id.clone(), e))
        });
        let results = join_all(decrements).await;

        let mut failed = Vec::new();
        let mut first_error = None;
        for result in results {
            if let Err((id, e)) = result {
                tracing::warn!(product_id = %id, error = %e, "checkout decrement failed");
                failed.push(id);
                first_error.get_or_insert(e);
            }
        }
        if let Some(source) = first_error {
            return Err(CartError::CheckoutFailed { failed, source });
        }

        let receipt = CheckoutReceipt {
            items: state.items().to_vec(),
            discount_code: state.discount_code().map(str::to_owned),
            totals: state.totals(&self.rules),
        };
        state.clear();
        tracing::info!(
            items = receipt.items.len(),
            total = %receipt.totals.total,
            "checkout completed"
        );
        Ok(receipt)
    }

    /// Quantity of `id` in the cart.
    pub async fn item_quantity(&self, id: &ProductId) -> u32 {
        self.state.lock().await.quantity_of(id)
    }

    /// Total units across all lines.
    pub async fn total_items(&self) -> u32 {
        self.state.lock().await.total_items()
    }

    /// Whether `code` names a configured discount.
    #[must_use]
    pub fn is_valid_discount_code(&self, code: &str) -> bool {
        self.rules.is_valid(code)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use am_popcorn_core::seed::{DEFAULT_SEED_STOCK, seed_catalog};
    use am_popcorn_core::{DiscountRule, NewProduct, ProductUpdate};

    use super::*;
    use crate::catalog::{MemoryCatalogStore, Subscription};

    fn id(s: &str) -> ProductId {
        ProductId::new(s)
    }

    fn engine_with(store: Arc<dyn CatalogStore>, settings: CartSettings) -> CartEngine {
        CartEngine::new(store, Arc::new(DiscountRules::default()), settings)
    }

    fn seeded() -> (Arc<MemoryCatalogStore>, CartEngine) {
        let store = Arc::new(MemoryCatalogStore::with_products(seed_catalog()));
        let engine = engine_with(store.clone(), CartSettings::default());
        (store, engine)
    }

    async fn product(store: &MemoryCatalogStore, s: &str) -> Product {
        store.get_product(&id(s)).await.unwrap()
    }

    /// Delegates reads to a memory store and fails writes on demand.
    struct FlakyStore {
        inner: MemoryCatalogStore,
        fail_ids: Vec<ProductId>,
        writes: AtomicUsize,
    }

    impl FlakyStore {
        fn failing(ids: &[&str]) -> Self {
            Self {
                inner: MemoryCatalogStore::with_products(seed_catalog()),
                fail_ids: ids.iter().copied().map(id).collect(),
                writes: AtomicUsize::new(0),
            }
        }

        fn refuse(&self, id: &ProductId) -> Result<(), CatalogError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(id) {
                return Err(CatalogError::RemoteWriteFailed("permission denied".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CatalogStore for FlakyStore {
        async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
            self.inner.list_products().await
        }
        async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
            self.inner.get_product(id).await
        }
        async fn get_current_stock(&self, id: &ProductId) -> Result<u32, CatalogError> {
            self.inner.get_current_stock(id).await
        }
        async fn update_stock(&self, id: &ProductId, stock: u32) -> Result<(), CatalogError> {
            self.refuse(id)?;
            self.inner.update_stock(id, stock).await
        }
        async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32, CatalogError> {
            self.refuse(id)?;
            self.inner.adjust_stock(id, delta).await
        }
        async fn create_product(&self, input: NewProduct) -> Result<Product, CatalogError> {
            self.inner.create_product(input).await
        }
        async fn update_product(
            &self,
            id: &ProductId,
            update: ProductUpdate,
        ) -> Result<Product, CatalogError> {
            self.inner.update_product(id, update).await
        }
        async fn delete_product(&self, id: &ProductId) -> Result<(), CatalogError> {
            self.inner.delete_product(id).await
        }
        async fn restock_all(&self) -> Result<(), CatalogError> {
            self.inner.restock_all().await
        }
        async fn restock_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
            self.inner.restock_product(id).await
        }
        async fn seed_if_empty(&self, products: &[Product]) -> Result<bool, CatalogError> {
            self.inner.seed_if_empty(products).await
        }
        fn subscribe(&self) -> Subscription {
            self.inner.subscribe()
        }
        async fn ping(&self) -> Result<(), CatalogError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_item_reserves_stock_then_commits() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "1").await).await.unwrap();
        engine.add_item(product(&store, "1").await).await.unwrap();

        assert_eq!(engine.item_quantity(&id("1")).await, 2);
        assert_eq!(
            store.get_current_stock(&id("1")).await.unwrap(),
            DEFAULT_SEED_STOCK - 2
        );
        let snapshot = engine.snapshot().await;
        assert_eq!(
            snapshot.state.item(&id("1")).unwrap().product.stock,
            DEFAULT_SEED_STOCK - 2
        );
    }

    #[tokio::test]
    async fn test_add_out_of_stock_leaves_cart_unchanged() {
        let (store, engine) = seeded();
        store.update_stock(&id("2"), 0).await.unwrap();

        let err = engine.add_item(product(&store, "2").await).await.unwrap_err();
        assert!(matches!(err, CartError::OutOfStock { .. }));
        assert_eq!(engine.total_items().await, 0);
    }

    #[tokio::test]
    async fn test_add_with_stale_snapshot_is_out_of_stock() {
        let (store, engine) = seeded();
        let stale = product(&store, "3").await;
        store.update_stock(&id("3"), 0).await.unwrap();

        let err = engine.add_item(stale).await.unwrap_err();
        assert!(matches!(err, CartError::OutOfStock { .. }));
        assert_eq!(engine.total_items().await, 0);
    }

    #[tokio::test]
    async fn test_add_remote_failure_is_stock_sync_failed() {
        let store = Arc::new(FlakyStore::failing(&["4"]));
        let engine = engine_with(store.clone(), CartSettings::default());

        let dulces = store.get_product(&id("4")).await.unwrap();
        let err = engine.add_item(dulces).await.unwrap_err();
        assert!(matches!(err, CartError::StockSyncFailed { .. }));
        assert_eq!(engine.item_quantity(&id("4")).await, 0);
    }

    #[tokio::test]
    async fn test_subtotal_tracks_operations() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "1").await).await.unwrap();
        engine.add_item(product(&store, "5").await).await.unwrap();
        engine.add_item(product(&store, "5").await).await.unwrap();
        engine.update_item_quantity(&id("1"), 3).await.unwrap();
        engine.remove_item(&id("5")).await;

        let snapshot = engine.snapshot().await;
        let expected: Decimal = snapshot
            .state
            .items()
            .iter()
            .map(|i| i.product.price.amount() * Decimal::from(i.quantity))
            .sum();
        assert_eq!(snapshot.totals.subtotal, expected);
        assert_eq!(snapshot.totals.subtotal, Decimal::from(4500));
    }

    #[tokio::test]
    async fn test_update_quantity_pushes_delta() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "6").await).await.unwrap();

        engine.update_item_quantity(&id("6"), 5).await.unwrap();
        assert_eq!(store.get_current_stock(&id("6")).await.unwrap(), 15);
        engine.update_item_quantity(&id("6"), 2).await.unwrap();
        assert_eq!(store.get_current_stock(&id("6")).await.unwrap(), 18);
        assert_eq!(engine.item_quantity(&id("6")).await, 2);
    }

    #[tokio::test]
    async fn test_update_quantity_beyond_snapshot_is_insufficient() {
        let (store, engine) = seeded();
        store.update_stock(&id("7"), 3).await.unwrap();
        engine.add_item(product(&store, "7").await).await.unwrap();

        let err = engine.update_item_quantity(&id("7"), 5).await.unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock { available: 2, .. }
        ));
        assert_eq!(engine.item_quantity(&id("7")).await, 1);
        assert_eq!(store.get_current_stock(&id("7")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "8").await).await.unwrap();
        engine.add_item(product(&store, "1").await).await.unwrap();

        engine.update_item_quantity(&id("8"), 0).await.unwrap();
        assert_eq!(engine.item_quantity(&id("8")).await, 0);
        assert_eq!(engine.total_items().await, 1);

        engine.update_item_quantity(&id("1"), -4).await.unwrap();
        assert_eq!(engine.total_items().await, 0);
    }

    #[tokio::test]
    async fn test_update_absent_item_is_noop() {
        let (store, engine) = seeded();
        engine.update_item_quantity(&id("3"), 4).await.unwrap();
        assert_eq!(engine.total_items().await, 0);
        assert_eq!(
            store.get_current_stock(&id("3")).await.unwrap(),
            DEFAULT_SEED_STOCK
        );
    }

    #[tokio::test]
    async fn test_update_remote_failure_keeps_quantity() {
        let store = Arc::new(FlakyStore::failing(&["2"]));
        let engine = engine_with(store.clone(), CartSettings::default());
        let cup = store.get_product(&id("2")).await.unwrap();
        engine.state.lock().await.add_one(cup);

        let err = engine.update_item_quantity(&id("2"), 3).await.unwrap_err();
        assert!(matches!(err, CartError::StockSyncFailed { .. }));
        assert_eq!(engine.item_quantity(&id("2")).await, 1);
    }

    #[tokio::test]
    async fn test_remove_releases_stock() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "4").await).await.unwrap();
        engine.add_item(product(&store, "4").await).await.unwrap();

        engine.remove_item(&id("4")).await;
        engine.remove_item(&id("4")).await;
        assert_eq!(
            store.get_current_stock(&id("4")).await.unwrap(),
            DEFAULT_SEED_STOCK
        );
    }

    #[tokio::test]
    async fn test_remove_without_release_keeps_store() {
        let store = Arc::new(MemoryCatalogStore::with_products(seed_catalog()));
        let engine = engine_with(
            store.clone(),
            CartSettings {
                release_stock_on_remove: false,
            },
        );
        engine.add_item(product(&store, "4").await).await.unwrap();
        engine.clear_cart().await;

        assert_eq!(engine.total_items().await, 0);
        assert_eq!(
            store.get_current_stock(&id("4")).await.unwrap(),
            DEFAULT_SEED_STOCK - 1
        );
    }

    #[tokio::test]
    async fn test_remove_succeeds_when_release_fails() {
        let store = Arc::new(FlakyStore::failing(&["5"]));
        let engine = engine_with(store.clone(), CartSettings::default());
        let juice = store.get_product(&id("5")).await.unwrap();
        engine.state.lock().await.add_one(juice);

        engine.remove_item(&id("5")).await;
        assert_eq!(engine.total_items().await, 0);
    }

    #[tokio::test]
    async fn test_discount_codes() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "1").await).await.unwrap();

        engine.apply_discount("ampopcorn").await.unwrap();
        let err = engine.apply_discount("NOPE").await.unwrap_err();
        assert!(matches!(err, CartError::InvalidDiscountCode(_)));

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.state.discount_code(), Some("AMPOPCORN"));
        assert_eq!(snapshot.totals.discount, Decimal::from(225));

        engine.remove_discount().await;
        engine.remove_discount().await;
        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.state.discount_code(), None);
        assert_eq!(snapshot.totals.discount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_primera_compra_on_one_thousand() {
        let store = Arc::new(MemoryCatalogStore::with_products(seed_catalog()));
        let engine = CartEngine::new(
            store.clone(),
            Arc::new(DiscountRules::new(vec![DiscountRule::percentage(
                "PRIMERA-COMPRA",
                Decimal::from(35),
            )])),
            CartSettings::default(),
        );
        let combo = store
            .create_product(NewProduct {
                name: "Combo".to_string(),
                category: am_popcorn_core::Category::Pochoclos,
                product_type: "Combo".to_string(),
                price: am_popcorn_core::Price::new(Decimal::from(1000)).unwrap(),
                stock: 5,
                initial_stock: None,
                image_url: None,
            })
            .await
            .unwrap();
        engine.add_item(combo).await.unwrap();
        engine.apply_discount("PRIMERA-COMPRA").await.unwrap();

        let totals = engine.snapshot().await.totals;
        assert_eq!(totals.discount, Decimal::from(350));
        assert_eq!(totals.total, Decimal::from(650));
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_touches_nothing() {
        let store = Arc::new(FlakyStore::failing(&[]));
        let engine = engine_with(store.clone(), CartSettings::default());

        let err = engine.checkout().await.unwrap_err();
        assert!(matches!(err, CartError::EmptyCart));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_checkout_clears_cart_and_decrements() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "1").await).await.unwrap();
        engine.add_item(product(&store, "6").await).await.unwrap();
        engine.update_item_quantity(&id("6"), 3).await.unwrap();
        engine.apply_discount("POPCORN10").await.unwrap();

        let receipt = engine.checkout().await.unwrap();
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.discount_code.as_deref(), Some("POPCORN10"));
        assert_eq!(receipt.totals.subtotal, Decimal::from(1950));
        assert_eq!(receipt.totals.total, Decimal::from(1755));

        assert_eq!(engine.total_items().await, 0);
        assert_eq!(engine.snapshot().await.state.discount_code(), None);
        // Reserved at add time and decremented again at checkout.
        assert_eq!(store.get_current_stock(&id("1")).await.unwrap(), 18);
        assert_eq!(store.get_current_stock(&id("6")).await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_checkout_short_snapshot_is_insufficient() {
        let store = Arc::new(FlakyStore::failing(&[]));
        let engine = engine_with(store.clone(), CartSettings::default());
        engine
            .state
            .lock()
            .await
            .add_one(store.get_product(&id("3")).await.unwrap().with_stock(0));
        let writes_before = store.writes.load(Ordering::SeqCst);

        let err = engine.checkout().await.unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock { available: 0, .. }
        ));
        assert_eq!(store.writes.load(Ordering::SeqCst), writes_before);
        assert_eq!(engine.total_items().await, 1);
    }

    #[tokio::test]
    async fn test_checkout_partial_failure_keeps_cart() {
        let store = Arc::new(FlakyStore::failing(&["2"]));
        let engine = engine_with(store.clone(), CartSettings::default());
        {
            let mut state = engine.state.lock().await;
            state.add_one(store.get_product(&id("1")).await.unwrap());
            state.add_one(store.get_product(&id("2")).await.unwrap());
        }

        let err = engine.checkout().await.unwrap_err();
        match err {
            CartError::CheckoutFailed { failed, .. } => assert_eq!(failed, vec![id("2")]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.total_items().await, 2);
        // The successful decrement is not rolled back.
        assert_eq!(
            store.get_current_stock(&id("1")).await.unwrap(),
            DEFAULT_SEED_STOCK - 1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_serialised() {
        let (store, engine) = seeded();
        let engine = Arc::new(engine);
        let stale = product(&store, "5").await;

        let adds = (0..10).map(|_| {
            let engine = engine.clone();
            let product = stale.clone();
            tokio::spawn(async move { engine.add_item(product).await })
        });
        for result in join_all(adds).await {
            result.unwrap().unwrap();
        }

        let remaining = store.get_current_stock(&id("5")).await.unwrap();
        let snapshot = engine.snapshot().await;
        let item = snapshot.state.item(&id("5")).unwrap();
        assert_eq!(item.quantity, 10);
        assert_eq!(remaining, DEFAULT_SEED_STOCK - 10);
        assert_eq!(item.product.stock, remaining);
    }

    #[tokio::test]
    async fn test_abandoned_cart_releases_once() {
        let (store, engine) = seeded();
        engine.add_item(product(&store, "1").await).await.unwrap();
        engine.add_item(product(&store, "1").await).await.unwrap();

        engine.abandon().await;
        assert_eq!(engine.total_items().await, 0);
        assert_eq!(
            store.get_current_stock(&id("1")).await.unwrap(),
            DEFAULT_SEED_STOCK
        );

        engine.clear_cart().await;
        engine.remove_item(&id("1")).await;
        assert_eq!(
            store.get_current_stock(&id("1")).await.unwrap(),
            DEFAULT_SEED_STOCK
        );
    }

    #[tokio::test]
    async fn test_discount_code_validity_is_pure() {
        let (_, engine) = seeded();
        assert!(engine.is_valid_discount_code("popcorn10"));
        assert!(!engine.is_valid_discount_code("POPCORN"));
    }
}
