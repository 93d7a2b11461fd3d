//! Catalog and stock store.
//!
//! The store owns the authoritative product list and stock counts. Carts never
//! write stock directly; they go through [`CatalogStore::adjust_stock`], which
//! applies a signed delta atomically and refuses to take stock below zero.
//!
//! Two implementations:
//!
//! - [`PgCatalogStore`] - `storefront.product` in `PostgreSQL`, with change
//!   notifications delivered through `LISTEN product_changes`
//! - [`MemoryCatalogStore`] - in-process map, used by tests and local demos
//!
//! Both lazily create seed products (see `am_popcorn_core::seed`) when a
//! seed id is read or written before it exists.

mod memory;
mod postgres;
mod subscription;

use async_trait::async_trait;
use thiserror::Error;

use am_popcorn_core::{NewProduct, Product, ProductId, ProductUpdate};

pub use memory::MemoryCatalogStore;
pub use postgres::PgCatalogStore;
pub use subscription::{CatalogSnapshot, Subscription};

/// Errors returned by a [`CatalogStore`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No product with this id, and it is not a seed product.
    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// A conditional decrement was refused because it would go below zero.
    #[error("only {available} left of product {product_id}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
    },

    /// A product with this id already exists.
    #[error("product already exists: {0}")]
    Conflict(ProductId),

    /// The store rejected or could not receive a write.
    #[error("failed to write to the catalog store: {0}")]
    RemoteWriteFailed(String),

    /// The store could not be read.
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be turned into a [`Product`].
    #[error("corrupt catalog data: {0}")]
    DataCorruption(String),
}

/// Authoritative product and stock storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All products, ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    /// One product. Seed products are created on first lookup.
    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError>;

    /// Current stock of one product. Seed products are created on first
    /// lookup and report their seed stock.
    async fn get_current_stock(&self, id: &ProductId) -> Result<u32, CatalogError>;

    /// Overwrite the stock of one product.
    async fn update_stock(&self, id: &ProductId, stock: u32) -> Result<(), CatalogError>;

    /// Atomically add `delta` (which may be negative) to the stock of one
    /// product and return the new stock.
    ///
    /// Fails with [`CatalogError::InsufficientStock`] and leaves the stock
    /// untouched when the result would be negative.
    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32, CatalogError>;

    /// Insert a new product under a freshly generated id.
    async fn create_product(&self, input: NewProduct) -> Result<Product, CatalogError>;

    /// Apply a partial update and return the result.
    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError>;

    /// Remove a product.
    async fn delete_product(&self, id: &ProductId) -> Result<(), CatalogError>;

    /// Reset every product's stock to its reference stock.
    async fn restock_all(&self) -> Result<(), CatalogError>;

    /// Reset one product's stock to its reference stock.
    async fn restock_product(&self, id: &ProductId) -> Result<Product, CatalogError>;

    /// Insert `products` if the catalog is empty. Returns whether it did.
    async fn seed_if_empty(&self, products: &[Product]) -> Result<bool, CatalogError>;

    /// Receive a full snapshot of the catalog after every change.
    fn subscribe(&self) -> Subscription;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), CatalogError>;
}

/// Stock after applying `delta` to `current`, or `None` when it would leave
/// the `u32` range.
pub(crate) fn apply_delta(current: u32, delta: i64) -> Option<u32> {
    i64::from(current)
        .checked_add(delta)
        .and_then(|next| u32::try_from(next).ok())
}

/// Fresh id for an admin-created product.
pub(crate) fn generate_product_id() -> ProductId {
    ProductId::new(uuid::Uuid::new_v4().simple().to_string())
}
