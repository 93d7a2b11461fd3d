//! In-process catalog store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, broadcast};

use am_popcorn_core::seed::seed_product;
use am_popcorn_core::{NewProduct, Product, ProductId, ProductUpdate};

use super::subscription::SNAPSHOT_CHANNEL_CAPACITY;
use super::{
    CatalogError, CatalogSnapshot, CatalogStore, Subscription, apply_delta, generate_product_id,
};

/// Catalog held in a map behind an async lock.
///
/// Every mutation publishes a fresh snapshot to subscribers while the write
/// lock is still held, so subscribers observe snapshots in write order.
#[derive(Debug)]
pub struct MemoryCatalogStore {
    products: RwLock<BTreeMap<ProductId, Product>>,
    changes: broadcast::Sender<CatalogSnapshot>,
}

impl Default for MemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalogStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_products([])
    }

    /// A store pre-populated with `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let (changes, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let products = products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();
        Self {
            products: RwLock::new(products),
            changes,
        }
    }

    fn publish(&self, products: &BTreeMap<ProductId, Product>) {
        // No receivers is not an error.
        let _ = self
            .changes
            .send(CatalogSnapshot::new(products.values().cloned().collect()));
    }

    /// The entry for `id`, creating it from the seed table if needed.
    fn entry_or_seed<'m>(
        products: &'m mut BTreeMap<ProductId, Product>,
        id: &ProductId,
    ) -> Result<(&'m mut Product, bool), CatalogError> {
        let created = if products.contains_key(id) {
            false
        } else {
            let mut seeded = seed_product(id).ok_or_else(|| CatalogError::NotFound(id.clone()))?;
            seeded.updated_at = Some(Utc::now());
            products.insert(id.clone(), seeded);
            true
        };
        products
            .get_mut(id)
            .map(|product| (product, created))
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.read().await.values().cloned().collect())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        if let Some(product) = self.products.read().await.get(id) {
            return Ok(product.clone());
        }
        let mut products = self.products.write().await;
        let (product, created) = Self::entry_or_seed(&mut products, id)?;
        let product = product.clone();
        if created {
            self.publish(&products);
        }
        Ok(product)
    }

    async fn get_current_stock(&self, id: &ProductId) -> Result<u32, CatalogError> {
        self.get_product(id).await.map(|product| product.stock)
    }

    async fn update_stock(&self, id: &ProductId, stock: u32) -> Result<(), CatalogError> {
        let mut products = self.products.write().await;
        let (product, _) = Self::entry_or_seed(&mut products, id)?;
        product.stock = stock;
        product.updated_at = Some(Utc::now());
        self.publish(&products);
        Ok(())
    }

    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32, CatalogError> {
        let mut products = self.products.write().await;
        let (product, created) = Self::entry_or_seed(&mut products, id)?;
        let Some(next) = apply_delta(product.stock, delta) else {
            let available = product.stock;
            if created {
                self.publish(&products);
            }
            return Err(CatalogError::InsufficientStock {
                product_id: id.clone(),
                available,
            });
        };
        product.stock = next;
        product.updated_at = Some(Utc::now());
        self.publish(&products);
        Ok(next)
    }

    async fn create_product(&self, input: NewProduct) -> Result<Product, CatalogError> {
        let product = input.into_product(generate_product_id(), Utc::now());
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(CatalogError::Conflict(product.id));
        }
        products.insert(product.id.clone(), product.clone());
        self.publish(&products);
        Ok(product)
    }

    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        update.apply_to(product, Utc::now());
        let product = product.clone();
        self.publish(&products);
        Ok(product)
    }

    async fn delete_product(&self, id: &ProductId) -> Result<(), CatalogError> {
        let mut products = self.products.write().await;
        if products.remove(id).is_none() {
            return Err(CatalogError::NotFound(id.clone()));
        }
        self.publish(&products);
        Ok(())
    }

    async fn restock_all(&self) -> Result<(), CatalogError> {
        let mut products = self.products.write().await;
        let now = Utc::now();
        for product in products.values_mut() {
            product.stock = product.initial_stock;
            product.updated_at = Some(now);
        }
        self.publish(&products);
        Ok(())
    }

    async fn restock_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        let mut products = self.products.write().await;
        let (product, _) = Self::entry_or_seed(&mut products, id)?;
        product.stock = product.initial_stock;
        product.updated_at = Some(Utc::now());
        let product = product.clone();
        self.publish(&products);
        Ok(product)
    }

    async fn seed_if_empty(&self, seed: &[Product]) -> Result<bool, CatalogError> {
        let mut products = self.products.write().await;
        if !products.is_empty() {
            return Ok(false);
        }
        let now = Utc::now();
        for product in seed {
            let mut product = product.clone();
            product.updated_at = Some(now);
            products.insert(product.id.clone(), product);
        }
        self.publish(&products);
        Ok(true)
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.changes.subscribe())
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}
