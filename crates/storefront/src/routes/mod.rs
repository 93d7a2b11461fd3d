//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness
//! GET    /health/ready                  - Catalog store reachability
//!
//! # Catalog
//! GET    /api/products                  - Catalog snapshot
//! GET    /api/products/stream           - Live catalog (SSE)
//! GET    /api/discounts/{code}          - Is this code accepted?
//!
//! # Cart (session-scoped)
//! GET    /api/cart                      - Cart view
//! DELETE /api/cart                      - Clear cart
//! POST   /api/cart/items                - Add one unit of a product
//! GET    /api/cart/items/{id}           - Quantity of one product
//! PATCH  /api/cart/items/{id}           - Set quantity (0 removes)
//! DELETE /api/cart/items/{id}           - Remove product
//! POST   /api/cart/discount             - Apply discount code
//! DELETE /api/cart/discount             - Remove discount code
//! POST   /api/cart/checkout             - Checkout and WhatsApp hand-off
//!
//! # Auth
//! POST   /auth/login                    - Admin login (rate limited)
//! POST   /auth/logout                   - Admin logout
//!
//! # Admin (requires allow-listed admin)
//! GET    /admin/products                - List products
//! POST   /admin/products                - Create product
//! PUT    /admin/products/{id}           - Update product
//! DELETE /admin/products/{id}           - Delete product
//! PUT    /admin/products/{id}/stock     - Set stock
//! POST   /admin/products/{id}/restock   - Restock one product
//! POST   /admin/products/restock        - Restock every product
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod discounts;
pub mod products;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/stream", get(products::stream))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            get(cart::item_quantity)
                .patch(cart::update_item)
                .delete(cart::remove_item),
        )
        .route(
            "/discount",
            post(cart::apply_discount).delete(cart::remove_discount),
        )
        .route("/checkout", post(cart::checkout))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login).layer(auth_rate_limiter()))
        .route("/logout", post(auth::logout))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(admin::list).post(admin::create))
        .route("/products/restock", post(admin::restock_all))
        .route("/products/{id}", put(admin::update).delete(admin::delete))
        .route("/products/{id}/stock", put(admin::set_stock))
        .route("/products/{id}/restock", post(admin::restock_one))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .route("/api/discounts/{code}", get(discounts::check))
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
}
