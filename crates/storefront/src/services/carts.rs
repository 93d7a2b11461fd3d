//! Live carts, keyed by the cart id stored in each shopper's session.
//!
//! Carts are not persisted. An idle cart expires from the registry; when it
//! does, whatever stock it still holds is handed back to the catalog (if the
//! engine is configured to release stock).

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use moka::future::Cache;
use moka::notification::{ListenerFuture, RemovalCause};
use uuid::Uuid;

use am_popcorn_core::{CartId, DiscountRules};

use super::cart::{CartEngine, CartSettings};
use crate::catalog::CatalogStore;

/// Carts idle for this long are dropped.
const CART_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

const MAX_CARTS: u64 = 10_000;

/// Registry of live carts.
#[derive(Clone)]
pub struct CartRegistry {
    carts: Cache<CartId, Arc<CartEngine>>,
    store: Arc<dyn CatalogStore>,
    rules: Arc<DiscountRules>,
    settings: CartSettings,
}

impl CartRegistry {
    #[must_use]
    pub fn new(
        store: Arc<dyn CatalogStore>,
        rules: Arc<DiscountRules>,
        settings: CartSettings,
    ) -> Self {
        Self::with_idle_timeout(store, rules, settings, CART_IDLE_TIMEOUT)
    }

    /// Like [`CartRegistry::new`], expiring carts after `idle_timeout`.
    #[must_use]
    pub fn with_idle_timeout(
        store: Arc<dyn CatalogStore>,
        rules: Arc<DiscountRules>,
        settings: CartSettings,
        idle_timeout: Duration,
    ) -> Self {
        let carts = Cache::builder()
            .max_capacity(MAX_CARTS)
            .time_to_idle(idle_timeout)
            .async_eviction_listener(release_on_eviction)
            .build();

        Self {
            carts,
            store,
            rules,
            settings,
        }
    }

    /// A fresh, unused cart id.
    #[must_use]
    pub fn new_cart_id() -> CartId {
        CartId::new(Uuid::new_v4().to_string())
    }

    /// The cart for `id`, if it is still live.
    pub async fn get(&self, id: &CartId) -> Option<Arc<CartEngine>> {
        self.carts.get(id).await
    }

    /// The cart for `id`, creating an empty one if needed.
    pub async fn get_or_create(&self, id: &CartId) -> Arc<CartEngine> {
        self.carts
            .get_with(id.clone(), async {
                tracing::debug!(cart_id = %id, "cart created");
                Arc::new(CartEngine::new(
                    self.store.clone(),
                    self.rules.clone(),
                    self.settings,
                ))
            })
            .await
    }

    /// The configured discount rules.
    #[must_use]
    pub fn rules(&self) -> &DiscountRules {
        &self.rules
    }
}

fn release_on_eviction(
    id: Arc<CartId>,
    cart: Arc<CartEngine>,
    cause: RemovalCause,
) -> ListenerFuture {
    async move {
        if cause.was_evicted() {
            tracing::info!(cart_id = %id, ?cause, "cart expired");
            cart.abandon().await;
        }
    }
    .boxed()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use am_popcorn_core::ProductId;
    use am_popcorn_core::seed::{DEFAULT_SEED_STOCK, seed_catalog};

    use super::*;
    use crate::catalog::MemoryCatalogStore;

    fn registry() -> CartRegistry {
        CartRegistry::new(
            Arc::new(MemoryCatalogStore::with_products(seed_catalog())),
            Arc::new(DiscountRules::default()),
            CartSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_same_id_same_cart() {
        let registry = registry();
        let id = CartRegistry::new_cart_id();
        let a = registry.get_or_create(&id).await;
        let b = registry.get_or_create(&id).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_carts_are_isolated() {
        let registry = registry();
        let first = registry.get_or_create(&CartRegistry::new_cart_id()).await;
        let second = registry.get_or_create(&CartRegistry::new_cart_id()).await;

        let product = registry
            .store
            .get_product(&ProductId::new("1"))
            .await
            .unwrap();
        first.add_item(product).await.unwrap();

        assert_eq!(first.total_items().await, 1);
        assert_eq!(second.total_items().await, 0);
    }

    #[tokio::test]
    async fn test_expired_cart_returns_its_stock() {
        let store = Arc::new(MemoryCatalogStore::with_products(seed_catalog()));
        let registry = CartRegistry::with_idle_timeout(
            store.clone(),
            Arc::new(DiscountRules::default()),
            CartSettings::default(),
            Duration::from_millis(50),
        );
        let id = ProductId::new("1");

        let cart = registry.get_or_create(&CartRegistry::new_cart_id()).await;
        cart.add_item(store.get_product(&id).await.unwrap())
            .await
            .unwrap();
        cart.add_item(store.get_product(&id).await.unwrap())
            .await
            .unwrap();
        assert_eq!(
            store.get_current_stock(&id).await.unwrap(),
            DEFAULT_SEED_STOCK - 2
        );

        let mut stock = 0;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            registry.carts.run_pending_tasks().await;
            stock = store.get_current_stock(&id).await.unwrap();
            if stock == DEFAULT_SEED_STOCK {
                break;
            }
        }
        assert_eq!(stock, DEFAULT_SEED_STOCK);

        // The engine handed out earlier no longer holds anything to release.
        assert_eq!(cart.total_items().await, 0);
        cart.clear_cart().await;
        assert_eq!(store.get_current_stock(&id).await.unwrap(), DEFAULT_SEED_STOCK);
    }

    #[tokio::test]
    async fn test_unknown_cart_is_absent() {
        let registry = registry();
        assert!(registry.get(&CartId::new("missing")).await.is_none());
    }
}
