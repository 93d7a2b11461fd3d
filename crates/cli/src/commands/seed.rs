//! Seed the catalog with the kiosk's eight products.

use am_popcorn_core::seed::seed_catalog;
use am_popcorn_storefront::catalog::{CatalogError, CatalogStore, PgCatalogStore};

use super::{ConnectError, connect};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Seed the catalog.
///
/// Without `force`, a catalog that already holds any product is left alone.
/// With `force`, the seed products are written over whatever is stored under
/// their ids; other products are untouched.
pub async fn catalog(force: bool) -> Result<(), SeedError> {
    let pool = connect().await?;
    let store = PgCatalogStore::connect(pool).await?;
    let products = seed_catalog();

    if force {
        store.overwrite_products(&products).await?;
        tracing::info!(count = products.len(), "Seed products overwritten");
    } else if store.seed_if_empty(&products).await? {
        tracing::info!(count = products.len(), "Catalog seeded");
    } else {
        tracing::info!("Catalog already has products; nothing to do (use --force to overwrite)");
    }

    Ok(())
}
