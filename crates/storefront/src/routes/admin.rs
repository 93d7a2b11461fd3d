//! Admin catalog management.
//!
//! Every handler takes [`RequireAdmin`], so requests without a signed-in,
//! allow-listed admin never reach the store.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use am_popcorn_core::{NewProduct, Product, ProductId, ProductUpdate};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: u32,
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Product name cannot be empty".to_string()));
    }
    Ok(())
}

/// `GET /admin/products`
#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list_products().await?))
}

/// `POST /admin/products`
#[instrument(skip_all, fields(admin = %admin.email, name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    require_name(&input.name)?;
    let product = state.catalog().create_product(input).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /admin/products/{id}`
#[instrument(skip_all, fields(admin = %admin.email, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    if let Some(name) = &update.name {
        require_name(name)?;
    }
    Ok(Json(state.catalog().update_product(&id, update).await?))
}

/// `DELETE /admin/products/{id}`
#[instrument(skip_all, fields(admin = %admin.email, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete_product(&id).await?;
    tracing::info!("product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /admin/products/{id}/stock`
#[instrument(skip_all, fields(admin = %admin.email, product_id = %id, stock = body.stock))]
pub async fn set_stock(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<SetStockRequest>,
) -> Result<Json<Product>> {
    state.catalog().update_stock(&id, body.stock).await?;
    Ok(Json(state.catalog().get_product(&id).await?))
}

/// `POST /admin/products/{id}/restock`
#[instrument(skip_all, fields(admin = %admin.email, product_id = %id))]
pub async fn restock_one(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().restock_product(&id).await?))
}

/// `POST /admin/products/restock`
#[instrument(skip_all, fields(admin = %admin.email))]
pub async fn restock_all(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    state.catalog().restock_all().await?;
    tracing::info!("catalog restocked");
    Ok(Json(state.catalog().list_products().await?))
}
