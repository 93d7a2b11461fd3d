//! Cart route handlers.
//!
//! Each shopper's cart id lives in their session; the engine itself lives in
//! the [`CartRegistry`](crate::services::CartRegistry). Reads never create a
//! cart, mutations do.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use am_popcorn_core::types::price::format_amount;
use am_popcorn_core::{CartId, CartItem, CartTotals, ProductId};

use crate::error::{AppError, Result};
use crate::models::session_keys;
use crate::services::checkout::{WhatsAppHandoff, handoff};
use crate::services::{CartEngine, CartError, CartRegistry, CartSnapshot, CheckoutReceipt};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub line_total_display: String,
    /// Stock as of the last reconciliation with the catalog.
    pub stock: u32,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        let line_total = item.line_total();
        Self {
            product_id: item.id.clone(),
            name: item.product.name.clone(),
            quantity: item.quantity,
            unit_price: item.product.price.amount(),
            line_total,
            line_total_display: format_amount(line_total),
            stock: item.product.stock,
        }
    }
}

/// Cart as returned by every cart endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub discount_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub total_display: String,
    pub item_count: u32,
}

impl CartView {
    fn new(items: &[CartItem], discount_code: Option<String>, totals: CartTotals) -> Self {
        Self {
            items: items.iter().map(CartItemView::from).collect(),
            discount_code,
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            total_display: format_amount(totals.total),
            item_count: items.iter().map(|item| item.quantity).sum(),
        }
    }

    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(&[], None, CartTotals::default())
    }
}

impl From<CartSnapshot> for CartView {
    fn from(snapshot: CartSnapshot) -> Self {
        let CartSnapshot { state, totals } = snapshot;
        Self::new(
            state.items(),
            state.discount_code().map(str::to_owned),
            totals,
        )
    }
}

impl From<&CheckoutReceipt> for CartView {
    fn from(receipt: &CheckoutReceipt) -> Self {
        Self::new(&receipt.items, receipt.discount_code.clone(), receipt.totals)
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn get_cart_id(session: &Session) -> Option<CartId> {
    session
        .get::<CartId>(session_keys::CART_ID)
        .await
        .ok()
        .flatten()
}

/// The session's live cart, if any.
async fn existing_cart(state: &AppState, session: &Session) -> Option<Arc<CartEngine>> {
    let id = get_cart_id(session).await?;
    state.carts().get(&id).await
}

/// The session's cart, creating it (and the session entry) if needed.
async fn cart_for(state: &AppState, session: &Session) -> Result<Arc<CartEngine>> {
    let id = if let Some(id) = get_cart_id(session).await {
        id
    } else {
        let id = CartRegistry::new_cart_id();
        session
            .insert(session_keys::CART_ID, &id)
            .await
            .map_err(|e| AppError::Internal(format!("failed to store cart id: {e}")))?;
        id
    };
    Ok(state.carts().get_or_create(&id).await)
}

async fn view_of(cart: &CartEngine) -> Json<CartView> {
    Json(cart.snapshot().await.into())
}

// =============================================================================
// Request Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDiscountRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemQuantityResponse {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: CartView,
    pub whatsapp: WhatsAppHandoff,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/cart`
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Json<CartView> {
    match existing_cart(&state, &session).await {
        Some(cart) => view_of(&cart).await,
        None => Json(CartView::empty()),
    }
}

/// `POST /api/cart/items`
///
/// The product is re-read from the catalog so the cart snapshot carries
/// current stock, not whatever the kiosk last rendered.
#[instrument(skip(state, session, body), fields(product_id = %body.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let product = state.catalog().get_product(&body.product_id).await?;
    let cart = cart_for(&state, &session).await?;
    cart.add_item(product).await?;
    Ok(view_of(&cart).await)
}

/// `PATCH /api/cart/items/{id}`
#[instrument(skip(state, session, body), fields(quantity = body.quantity))]
pub async fn update_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>> {
    let Some(cart) = existing_cart(&state, &session).await else {
        return Ok(Json(CartView::empty()));
    };
    cart.update_item_quantity(&product_id, body.quantity).await?;
    Ok(view_of(&cart).await)
}

/// `DELETE /api/cart/items/{id}`
#[instrument(skip(state, session))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Json<CartView> {
    let Some(cart) = existing_cart(&state, &session).await else {
        return Json(CartView::empty());
    };
    cart.remove_item(&product_id).await;
    view_of(&cart).await
}

/// `GET /api/cart/items/{id}`
#[instrument(skip(state, session))]
pub async fn item_quantity(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Json<ItemQuantityResponse> {
    let quantity = match existing_cart(&state, &session).await {
        Some(cart) => cart.item_quantity(&product_id).await,
        None => 0,
    };
    Json(ItemQuantityResponse {
        product_id,
        quantity,
    })
}

/// `POST /api/cart/discount`
#[instrument(skip(state, session, body))]
pub async fn apply_discount(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ApplyDiscountRequest>,
) -> Result<Json<CartView>> {
    let cart = cart_for(&state, &session).await?;
    cart.apply_discount(&body.code).await?;
    Ok(view_of(&cart).await)
}

/// `DELETE /api/cart/discount`
#[instrument(skip(state, session))]
pub async fn remove_discount(State(state): State<AppState>, session: Session) -> Json<CartView> {
    let Some(cart) = existing_cart(&state, &session).await else {
        return Json(CartView::empty());
    };
    cart.remove_discount().await;
    view_of(&cart).await
}

/// `DELETE /api/cart`
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> StatusCode {
    if let Some(cart) = existing_cart(&state, &session).await {
        cart.clear_cart().await;
    }
    StatusCode::NO_CONTENT
}

/// `POST /api/cart/checkout`
///
/// On success the cart is empty and the response carries the WhatsApp
/// message and link for the order that was just placed.
#[instrument(skip(state, session, body))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    body: Option<Json<CheckoutRequest>>,
) -> Result<Json<CheckoutResponse>> {
    let customer_name = body.and_then(|Json(body)| body.customer_name);
    let Some(cart) = existing_cart(&state, &session).await else {
        return Err(CartError::EmptyCart.into());
    };

    let receipt = cart.checkout().await?;
    let whatsapp = handoff(
        &receipt,
        &state.config().whatsapp_number,
        customer_name.as_deref(),
    )
    .map_err(|e| AppError::Internal(format!("failed to build WhatsApp link: {e}")))?;

    tracing::info!(
        items = receipt.items.len(),
        total = %receipt.totals.total,
        "order handed off to WhatsApp"
    );

    Ok(Json(CheckoutResponse {
        order: CartView::from(&receipt),
        whatsapp,
    }))
}
