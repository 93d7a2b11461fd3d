//! `PostgreSQL` catalog store.
//!
//! Products live in `storefront.product`. A trigger on that table issues
//! `pg_notify('product_changes', id)` after every write; a background task
//! listens on that channel, reloads the full catalog and broadcasts it to
//! subscribers. Each reload reads the latest state, so the most recent
//! snapshot always wins.
//!
//! Stock writes made on behalf of carts use a conditional `UPDATE` so two
//! kiosks can never sell the same unit twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tracing::instrument;

use am_popcorn_core::seed::seed_product;
use am_popcorn_core::{Category, NewProduct, Price, Product, ProductId, ProductUpdate};

use super::subscription::SNAPSHOT_CHANNEL_CAPACITY;
use super::{
    CatalogError, CatalogSnapshot, CatalogStore, Subscription, generate_product_id,
};

/// Channel the product trigger notifies on.
pub const PRODUCT_CHANGES_CHANNEL: &str = "product_changes";

const PRODUCT_COLUMNS: &str =
    "id, name, category, product_type, price, stock, initial_stock, image_url, updated_at";

/// Catalog store backed by `storefront.product`.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
    changes: broadcast::Sender<CatalogSnapshot>,
}

impl PgCatalogStore {
    /// Create the store and start forwarding change notifications.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unavailable` if the notification listener
    /// cannot connect.
    pub async fn connect(pool: PgPool) -> Result<Self, CatalogError> {
        let (changes, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let store = Self { pool, changes };

        let mut listener = PgListener::connect_with(&store.pool)
            .await
            .map_err(unavailable)?;
        listener
            .listen(PRODUCT_CHANGES_CHANNEL)
            .await
            .map_err(unavailable)?;

        let forwarder = store.clone();
        tokio::spawn(async move { forwarder.forward_changes(listener).await });

        Ok(store)
    }

    async fn forward_changes(self, mut listener: PgListener) {
        loop {
            match listener.recv().await {
                Ok(notification) => {
                    tracing::debug!(product_id = notification.payload(), "product changed");
                    if self.changes.receiver_count() == 0 {
                        continue;
                    }
                    match self.list_products().await {
                        Ok(products) => {
                            let _ = self.changes.send(CatalogSnapshot::new(products));
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to reload catalog"),
                    }
                }
                Err(e) => {
                    // PgListener reconnects on the next recv.
                    tracing::warn!(error = %e, "product change listener error");
                }
            }
        }
    }

    /// Insert the seed entry for `id` if it is a seed product and missing.
    async fn ensure_seeded(&self, id: &ProductId) -> Result<(), CatalogError> {
        let Some(seed) = seed_product(id) else {
            return Ok(());
        };
        let row = ProductRow::from(&seed);
        sqlx::query(
            r"
            INSERT INTO storefront.product
                (id, name, category, product_type, price, stock, initial_stock, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.category)
        .bind(&row.product_type)
        .bind(row.price)
        .bind(row.stock)
        .bind(row.initial_stock)
        .bind(&row.image_url)
        .execute(&self.pool)
        .await
        .map_err(write_failed)?;
        Ok(())
    }

    async fn fetch(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.map(Product::try_from).transpose()
    }

    /// Insert `products`, overwriting any product with the same id.
    ///
    /// Products not in `products` are left alone.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::RemoteWriteFailed` if any write fails; the
    /// whole batch is rolled back.
    #[instrument(skip(self, products), fields(count = products.len()))]
    pub async fn overwrite_products(&self, products: &[Product]) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await.map_err(write_failed)?;
        for product in products {
            let row = ProductRow::from(product);
            sqlx::query(
                r"
                INSERT INTO storefront.product
                    (id, name, category, product_type, price, stock, initial_stock, image_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    category = EXCLUDED.category,
                    product_type = EXCLUDED.product_type,
                    price = EXCLUDED.price,
                    stock = EXCLUDED.stock,
                    initial_stock = EXCLUDED.initial_stock,
                    image_url = EXCLUDED.image_url,
                    updated_at = now()
                ",
            )
            .bind(&row.id)
            .bind(&row.name)
            .bind(&row.category)
            .bind(&row.product_type)
            .bind(row.price)
            .bind(row.stock)
            .bind(row.initial_stock)
            .bind(&row.image_url)
            .execute(&mut *tx)
            .await
            .map_err(write_failed)?;
        }
        tx.commit().await.map_err(write_failed)
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.into_iter().map(Product::try_from).collect()
    }

    #[instrument(skip(self, id), fields(product_id = %id))]
    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        if let Some(product) = self.fetch(id).await? {
            return Ok(product);
        }
        self.ensure_seeded(id).await?;
        self.fetch(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }

    async fn get_current_stock(&self, id: &ProductId) -> Result<u32, CatalogError> {
        self.get_product(id).await.map(|product| product.stock)
    }

    #[instrument(skip(self, id), fields(product_id = %id))]
    async fn update_stock(&self, id: &ProductId, stock: u32) -> Result<(), CatalogError> {
        self.ensure_seeded(id).await?;
        let stock = i32::try_from(stock)
            .map_err(|_| CatalogError::RemoteWriteFailed(format!("stock {stock} out of range")))?;
        let result = sqlx::query(
            "UPDATE storefront.product SET stock = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(stock)
        .execute(&self.pool)
        .await
        .map_err(write_failed)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id.clone()));
        }
        Ok(())
    }

    #[instrument(skip(self, id), fields(product_id = %id))]
    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32, CatalogError> {
        self.ensure_seeded(id).await?;
        let updated: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE storefront.product
            SET stock = stock + $2, updated_at = now()
            WHERE id = $1 AND stock + $2 >= 0 AND stock + $2 <= 2147483647
            RETURNING stock::BIGINT
            ",
        )
        .bind(id.as_str())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_failed)?;

        if let Some(stock) = updated {
            return u32::try_from(stock)
                .map_err(|_| CatalogError::DataCorruption(format!("negative stock {stock}")));
        }

        // The guard refused the write. Report what is actually there.
        let available = self.get_current_stock(id).await?;
        Err(CatalogError::InsufficientStock {
            product_id: id.clone(),
            available,
        })
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_product(&self, input: NewProduct) -> Result<Product, CatalogError> {
        let product = input.into_product(generate_product_id(), Utc::now());
        let row = ProductRow::from(&product);
        let inserted: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.product
                (id, name, category, product_type, price, stock, initial_stock, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.category)
        .bind(&row.product_type)
        .bind(row.price)
        .bind(row.stock)
        .bind(row.initial_stock)
        .bind(&row.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return CatalogError::Conflict(product.id.clone());
            }
            write_failed(e)
        })?;
        Product::try_from(inserted)
    }

    /// Only the columns named in `update` are written; in particular `stock`
    /// is left alone unless the update sets it, so reservations made while
    /// an admin edits a product are kept.
    #[instrument(skip(self, id, update), fields(product_id = %id))]
    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        let patch = ProductPatch::try_from(update)?;

        let updated: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.product
            SET name = COALESCE($2::TEXT, name),
                category = COALESCE($3::TEXT, category),
                product_type = COALESCE($4::TEXT, product_type),
                price = COALESCE($5::NUMERIC, price),
                stock = COALESCE($6::INTEGER, stock),
                initial_stock = COALESCE($7::INTEGER, initial_stock),
                image_url = CASE WHEN $8::BOOLEAN THEN $9::TEXT ELSE image_url END,
                updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id.as_str())
        .bind(patch.name)
        .bind(patch.category)
        .bind(patch.product_type)
        .bind(patch.price)
        .bind(patch.stock)
        .bind(patch.initial_stock)
        .bind(patch.image_url.is_some())
        .bind(patch.image_url.flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(write_failed)?;

        updated
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
            .and_then(Product::try_from)
    }

    #[instrument(skip(self, id), fields(product_id = %id))]
    async fn delete_product(&self, id: &ProductId) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(write_failed)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id.clone()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn restock_all(&self) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "UPDATE storefront.product SET stock = initial_stock, updated_at = now()",
        )
        .execute(&self.pool)
        .await
        .map_err(write_failed)?;
        tracing::info!(products = result.rows_affected(), "catalog restocked");
        Ok(())
    }

    #[instrument(skip(self, id), fields(product_id = %id))]
    async fn restock_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        self.ensure_seeded(id).await?;
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.product
            SET stock = initial_stock, updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(write_failed)?;

        row.ok_or_else(|| CatalogError::NotFound(id.clone()))
            .and_then(Product::try_from)
    }

    #[instrument(skip(self, products), fields(count = products.len()))]
    async fn seed_if_empty(&self, products: &[Product]) -> Result<bool, CatalogError> {
        let mut tx = self.pool.begin().await.map_err(write_failed)?;

        // Serialise concurrent seeders.
        sqlx::query("LOCK TABLE storefront.product IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(write_failed)?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storefront.product")
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable)?;
        if existing > 0 {
            return Ok(false);
        }

        for product in products {
            let row = ProductRow::from(product);
            sqlx::query(
                r"
                INSERT INTO storefront.product
                    (id, name, category, product_type, price, stock, initial_stock, image_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(&row.id)
            .bind(&row.name)
            .bind(&row.category)
            .bind(&row.product_type)
            .bind(row.price)
            .bind(row.stock)
            .bind(row.initial_stock)
            .bind(&row.image_url)
            .execute(&mut *tx)
            .await
            .map_err(write_failed)?;
        }

        tx.commit().await.map_err(write_failed)?;
        tracing::info!(count = products.len(), "catalog seeded");
        Ok(true)
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.changes.subscribe())
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(unavailable)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    category: String,
    product_type: String,
    price: Decimal,
    stock: i32,
    initial_stock: i32,
    image_url: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_str().to_owned(),
            name: product.name.clone(),
            category: product.category.as_str().to_owned(),
            product_type: product.product_type.clone(),
            price: product.price.amount(),
            stock: i32::try_from(product.stock).unwrap_or(i32::MAX),
            initial_stock: i32::try_from(product.initial_stock).unwrap_or(i32::MAX),
            image_url: product.image_url.clone(),
            updated_at: product.updated_at,
        }
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = CatalogError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| CatalogError::DataCorruption(format!("product {}: {what}", row.id));

        let category = row
            .category
            .parse::<Category>()
            .map_err(|e| corrupt(e.to_string()))?;
        let price = Price::new(row.price).map_err(|e| corrupt(e.to_string()))?;
        let stock =
            u32::try_from(row.stock).map_err(|_| corrupt(format!("stock {}", row.stock)))?;
        let initial_stock = u32::try_from(row.initial_stock)
            .map_err(|_| corrupt(format!("initial_stock {}", row.initial_stock)))?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            category,
            product_type: row.product_type,
            price,
            stock,
            initial_stock,
            image_url: row.image_url,
            updated_at: row.updated_at,
        })
    }
}

/// Column values for a partial update; `None` keeps the stored value.
#[derive(Debug)]
struct ProductPatch {
    name: Option<String>,
    category: Option<String>,
    product_type: Option<String>,
    price: Option<Decimal>,
    stock: Option<i32>,
    initial_stock: Option<i32>,
    image_url: Option<Option<String>>,
}

impl TryFrom<ProductUpdate> for ProductPatch {
    type Error = CatalogError;

    fn try_from(update: ProductUpdate) -> Result<Self, Self::Error> {
        let column = |value: Option<u32>, what: &str| {
            value
                .map(|v| {
                    i32::try_from(v).map_err(|_| {
                        CatalogError::RemoteWriteFailed(format!("{what} {v} out of range"))
                    })
                })
                .transpose()
        };

        Ok(Self {
            name: update.name,
            category: update.category.map(|c| c.as_str().to_owned()),
            product_type: update.product_type,
            price: update.price.map(|p| p.amount()),
            stock: column(update.stock, "stock")?,
            initial_stock: column(update.initial_stock, "initial_stock")?,
            image_url: update.image_url,
        })
    }
}

fn unavailable(e: sqlx::Error) -> CatalogError {
    CatalogError::Unavailable(e.to_string())
}

fn write_failed(e: sqlx::Error) -> CatalogError {
    CatalogError::RemoteWriteFailed(e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use am_popcorn_core::seed::seed_catalog;

    use super::*;

    #[test]
    fn test_row_round_trip_preserves_product() {
        let product = seed_catalog().remove(0);
        let row = ProductRow::from(&product);
        assert_eq!(row.category, "POCHOCLOS");
        assert_eq!(Product::try_from(row).unwrap(), product);
    }

    #[test]
    fn test_partial_update_leaves_stock_column_alone() {
        let update = ProductUpdate {
            name: Some("Pochoclos XL".to_string()),
            ..ProductUpdate::default()
        };
        let patch = ProductPatch::try_from(update).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Pochoclos XL"));
        assert_eq!(patch.stock, None);
        assert_eq!(patch.initial_stock, None);
        assert_eq!(patch.image_url, None);
    }

    #[test]
    fn test_patch_carries_explicit_values() {
        let update = ProductUpdate {
            category: Some(Category::Bebida),
            stock: Some(7),
            image_url: Some(None),
            ..ProductUpdate::default()
        };
        let patch = ProductPatch::try_from(update).unwrap();
        assert_eq!(patch.category.as_deref(), Some("BEBIDA"));
        assert_eq!(patch.stock, Some(7));
        assert_eq!(patch.image_url, Some(None));

        let update = ProductUpdate {
            stock: Some(u32::MAX),
            ..ProductUpdate::default()
        };
        assert!(matches!(
            ProductPatch::try_from(update),
            Err(CatalogError::RemoteWriteFailed(_))
        ));
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        let mut row = ProductRow::from(&seed_catalog().remove(1));
        row.stock = -3;
        assert!(matches!(
            Product::try_from(row),
            Err(CatalogError::DataCorruption(_))
        ));

        let mut row = ProductRow::from(&seed_catalog().remove(1));
        row.category = "SNACK".to_string();
        assert!(matches!(
            Product::try_from(row),
            Err(CatalogError::DataCorruption(_))
        ));
    }
}
