//! Application state shared across handlers.

use std::sync::Arc;

use am_popcorn_core::DiscountRules;

use crate::catalog::CatalogStore;
use crate::config::StorefrontConfig;
use crate::db::AdminCredentialStore;
use crate::services::{CartRegistry, CartSettings};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the catalog store, the live carts and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Arc<dyn CatalogStore>,
    admins: Arc<dyn AdminCredentialStore>,
    carts: CartRegistry,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `catalog` - Catalog and stock store
    /// * `admins` - Admin credential lookup
    /// * `rules` - Discount rules applied to every cart
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        catalog: Arc<dyn CatalogStore>,
        admins: Arc<dyn AdminCredentialStore>,
        rules: DiscountRules,
    ) -> Self {
        let settings = CartSettings {
            release_stock_on_remove: config.release_stock_on_remove,
        };
        let carts = CartRegistry::new(catalog.clone(), Arc::new(rules), settings);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                admins,
                carts,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog store.
    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.catalog.as_ref()
    }

    /// Get a reference to the admin credential store.
    #[must_use]
    pub fn admins(&self) -> &dyn AdminCredentialStore {
        self.inner.admins.as_ref()
    }

    /// Get a reference to the live cart registry.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry {
        &self.inner.carts
    }
}
