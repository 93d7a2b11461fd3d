//! Admin sign-in and catalog management.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use am_popcorn_integration_tests::{ADMIN_EMAIL, ADMIN_PASSWORD, OUTSIDER_EMAIL, TestApp};

async fn signed_in() -> TestApp {
    let mut app = TestApp::new().await;
    let resp = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(resp.status, StatusCode::OK);
    app
}

#[tokio::test]
async fn test_admin_routes_require_login() {
    let mut app = TestApp::new().await;

    let resp = app.get("/admin/products").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["error"], "unauthorized");

    let resp = app.post_empty("/admin/products/restock").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let mut app = TestApp::new().await;

    let resp = app.login(ADMIN_EMAIL, "wrong password").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["error"], "invalid_credentials");

    let resp = app.login("nadie@ampopcorn.com.ar", ADMIN_PASSWORD).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.login("not an email", ADMIN_PASSWORD).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.get("/admin/products").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_login_requires_allow_list() {
    let mut app = TestApp::new().await;

    let resp = app.login(OUTSIDER_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.body["error"], "forbidden");
    assert_eq!(
        app.get("/admin/products").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_logout_ends_admin_session() {
    let mut app = signed_in().await;
    assert_eq!(app.get("/admin/products").await.status, StatusCode::OK);

    let resp = app.post_empty("/auth/logout").await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.get("/admin/products").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_logout_keeps_cart() {
    let mut app = signed_in().await;
    app.add_to_cart("1").await;

    app.post_empty("/auth/logout").await;
    assert_eq!(app.get("/api/cart").await.body["item_count"], 1);
}

#[tokio::test]
async fn test_product_lifecycle() {
    let mut app = signed_in().await;

    let resp = app.get("/admin/products").await;
    assert_eq!(resp.body.as_array().unwrap().len(), 8);

    let resp = app
        .post(
            "/admin/products",
            json!({
                "name": "Pochoclos Picantes",
                "category": "POCHOCLOS",
                "type": "Salado",
                "price": "1800",
                "stock": 5,
                "initial_stock": 12
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let id = resp.body["id"].as_str().unwrap().to_string();
    assert_eq!(resp.body["stock"], 5);
    assert_eq!(resp.body["initial_stock"], 12);

    // Shoppers see it straight away
    let catalog = app.get("/api/products").await;
    let listed = catalog
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == id.as_str())
        .cloned()
        .unwrap();
    assert_eq!(listed["in_stock"], true);

    let resp = app
        .put(&format!("/admin/products/{id}"), json!({ "price": "2000" }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["name"], "Pochoclos Picantes");

    let resp = app
        .put(&format!("/admin/products/{id}/stock"), json!({ "stock": 0 }))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["stock"], 0);

    let resp = app.post_empty(&format!("/admin/products/{id}/restock")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["stock"], 12);

    let resp = app.delete(&format!("/admin/products/{id}")).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    let resp = app.delete(&format!("/admin/products/{id}")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let mut app = signed_in().await;

    let resp = app
        .post(
            "/admin/products",
            json!({
                "name": "   ",
                "category": "BEBIDA",
                "type": "Jugo",
                "price": "600",
                "stock": 10
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_restock_all_undoes_sales() {
    let mut app = signed_in().await;
    let mut shopper = app.other_shopper();

    shopper.add_to_cart("1").await;
    shopper.add_to_cart("2").await;
    shopper.post("/api/cart/checkout", json!({})).await;
    assert!(app.stock_of("1").await < 20);

    let resp = app.post_empty("/admin/products/restock").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(
        resp.body
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["stock"] == p["initial_stock"])
    );
    assert_eq!(app.stock_of("1").await, 20);
}
