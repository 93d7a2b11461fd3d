//! Integration tests for the AM Popcorn storefront.
//!
//! The full router is driven in-process with `tower::ServiceExt::oneshot`,
//! backed by the in-memory catalog store, in-memory admin accounts and the
//! tower-sessions `MemoryStore`. No database or network is needed:
//!
//! ```bash
//! cargo test -p am-popcorn-integration-tests
//! ```
//!
//! [`TestApp`] plays one browser: it keeps the session cookie between
//! requests. [`TestApp::other_shopper`] gives a second browser against the
//! same server.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use futures::StreamExt;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use am_popcorn_core::seed::seed_catalog;
use am_popcorn_core::{DiscountRules, Email, ProductId};
use am_popcorn_storefront::catalog::{CatalogStore, MemoryCatalogStore};
use am_popcorn_storefront::config::{AdminAllowList, StorefrontConfig};
use am_popcorn_storefront::db::MemoryAdminUsers;
use am_popcorn_storefront::middleware::session::{SESSION_COOKIE_NAME, session_layer_with_store};
use am_popcorn_storefront::services::auth::hash_password;
use am_popcorn_storefront::state::AppState;

/// Allow-listed admin with an account.
pub const ADMIN_EMAIL: &str = "admin@ampopcorn.com.ar";
/// Password for both test accounts.
pub const ADMIN_PASSWORD: &str = "pochoclos-con-caramelo";
/// Has an account but is not on the allow-list.
pub const OUTSIDER_EMAIL: &str = "ex-empleado@ampopcorn.com.ar";
/// Destination for checkout messages.
pub const WHATSAPP_NUMBER: &str = "5491155550000";

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `Value::Null` for empty bodies.
    pub body: Value,
}

/// One browser talking to an in-process storefront.
pub struct TestApp {
    router: Router,
    /// The store behind the router, for asserting on stock.
    pub catalog: Arc<MemoryCatalogStore>,
    cookie: Option<String>,
}

/// Configuration used by every test app.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        whatsapp_number: WHATSAPP_NUMBER.to_string(),
        admin_allowed_emails: AdminAllowList::new(vec![
            Email::parse(ADMIN_EMAIL).expect("valid admin email"),
        ]),
        discounts_file: None,
        release_stock_on_remove: true,
        seed_catalog: true,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_traces_sample_rate: 0.0,
    }
}

impl TestApp {
    /// A storefront over the eight seed products.
    pub async fn new() -> Self {
        Self::with_catalog(MemoryCatalogStore::with_products(seed_catalog())).await
    }

    /// A storefront over `catalog`.
    pub async fn with_catalog(catalog: MemoryCatalogStore) -> Self {
        Self::with_config(catalog, test_config()).await
    }

    /// A storefront over `catalog` with a custom configuration.
    pub async fn with_config(catalog: MemoryCatalogStore, config: StorefrontConfig) -> Self {
        let catalog = Arc::new(catalog);

        let admins = MemoryAdminUsers::new();
        let hash = hash_password(ADMIN_PASSWORD).expect("hash test password");
        for email in [ADMIN_EMAIL, OUTSIDER_EMAIL] {
            admins
                .upsert(Email::parse(email).expect("valid email"), hash.clone())
                .await;
        }

        let session_layer = session_layer_with_store(MemoryStore::default(), &config);
        let state = AppState::new(
            config,
            catalog.clone(),
            Arc::new(admins),
            DiscountRules::default(),
        );

        Self {
            router: am_popcorn_storefront::build_router(state, session_layer),
            catalog,
            cookie: None,
        }
    }

    /// A second browser (no session) against the same server.
    #[must_use]
    pub fn other_shopper(&self) -> Self {
        Self {
            router: self.router.clone(),
            catalog: self.catalog.clone(),
            cookie: None,
        }
    }

    fn build_request(&self, method: Method, uri: &str, body: Option<&Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            // The login rate limiter keys on the proxy-supplied client IP
            .header("x-forwarded-for", "203.0.113.10");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).expect("valid request")
    }

    fn remember_cookie(&mut self, headers: &HeaderMap) {
        let prefix = format!("{SESSION_COOKIE_NAME}=");
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            if let Some(pair) = value.split(';').next().filter(|p| p.starts_with(&prefix)) {
                self.cookie = Some(pair.to_string());
            }
        }
    }

    /// Send a request, keeping the session cookie.
    pub async fn request(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let request = self.build_request(method, uri, body.as_ref());
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        self.remember_cookie(&headers);

        let bytes = axum::body::to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&mut self, uri: &str) -> TestResponse {
        self.request(Method::POST, uri, None).await
    }

    pub async fn put(&mut self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn patch(&mut self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Sign in; the session keeps the admin afterwards.
    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.post(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Add one unit of `product_id` to this browser's cart.
    pub async fn add_to_cart(&mut self, product_id: &str) -> TestResponse {
        self.post(
            "/api/cart/items",
            serde_json::json!({ "product_id": product_id }),
        )
        .await
    }

    /// Stock of `product_id` in the catalog store.
    pub async fn stock_of(&self, product_id: &str) -> u32 {
        self.catalog
            .get_current_stock(&ProductId::new(product_id))
            .await
            .expect("product exists")
    }

    /// Open an SSE stream at `uri` and return the first event's `data` as JSON.
    pub async fn first_event(&self, uri: &str) -> (StatusCode, Value) {
        let request = self.build_request(Method::GET, uri, None);
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();

        let mut stream = response.into_body().into_data_stream();
        let mut buffer = String::new();
        let read = async {
            while let Some(chunk) = stream.next().await {
                buffer.push_str(&String::from_utf8_lossy(&chunk.expect("stream chunk")));
                if buffer.contains("\n\n") {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), read)
            .await
            .expect("first event within timeout");

        let data: String = buffer
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect();
        let value = serde_json::from_str(&data).expect("event data is JSON");
        (status, value)
    }
}
