//! Router assembly.

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn,
    routing::get,
};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::routes;
use crate::state::AppState;

/// Build the full application router.
///
/// The session store is a parameter so tests can use
/// `tower_sessions::MemoryStore`. Sentry layers are added by the binary.
pub fn build_router<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the catalog store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.catalog().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use secrecy::SecretString;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use am_popcorn_core::DiscountRules;
    use am_popcorn_core::seed::seed_catalog;

    use super::*;
    use crate::catalog::MemoryCatalogStore;
    use crate::config::{AdminAllowList, StorefrontConfig};
    use crate::db::MemoryAdminUsers;
    use crate::middleware::session_layer_with_store;

    fn router() -> Router {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://unused"),
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: "http://localhost:3000".to_string(),
            whatsapp_number: "5491155550000".to_string(),
            admin_allowed_emails: AdminAllowList::default(),
            discounts_file: None,
            release_stock_on_remove: true,
            seed_catalog: true,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_traces_sample_rate: 0.0,
        };
        let session_layer = session_layer_with_store(MemoryStore::default(), &config);
        let state = AppState::new(
            config,
            Arc::new(MemoryCatalogStore::with_products(seed_catalog())),
            Arc::new(MemoryAdminUsers::new()),
            DiscountRules::default(),
        );
        build_router(state, session_layer)
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        for uri in ["/health", "/health/ready"] {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let resp = router().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_upstream_request_id_is_echoed() {
        let req = Request::builder()
            .uri("/health")
            .header("x-request-id", "kiosk-42")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.headers()["x-request-id"], "kiosk-42");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let req = Request::builder()
            .uri("/api/nothing-here")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
