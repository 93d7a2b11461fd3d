//! AM Popcorn storefront - kiosk backend.
//!
//! Serves the JSON API and the live catalog stream on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out, SSE for catalog updates
//! - `PostgreSQL` as the catalog and stock store (LISTEN/NOTIFY for changes)
//! - In-process carts keyed by session, expiring when idle
//! - Checkout hands the order to WhatsApp; nothing is charged here
//!
//! Migrations are NOT run on startup. Run them with `popcorn-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::error::Error;
use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use am_popcorn_core::seed::seed_catalog;
use am_popcorn_storefront::catalog::{CatalogStore, PgCatalogStore};
use am_popcorn_storefront::config::StorefrontConfig;
use am_popcorn_storefront::db::{self, AdminUserRepository};
use am_popcorn_storefront::middleware::create_session_layer;
use am_popcorn_storefront::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "am_popcorn_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    let catalog = PgCatalogStore::connect(pool.clone()).await?;
    if config.seed_catalog && catalog.seed_if_empty(&seed_catalog()).await? {
        tracing::info!("Empty catalog seeded");
    }

    let rules = config.load_discount_rules()?;
    tracing::info!(codes = rules.len(), "Discount rules loaded");
    if config.admin_allowed_emails.is_empty() {
        tracing::warn!("ADMIN_ALLOWED_EMAILS is empty; the admin surface is closed");
    }

    let session_layer = create_session_layer(&pool, &config);
    let state = AppState::new(
        config.clone(),
        Arc::new(catalog),
        Arc::new(AdminUserRepository::new(pool)),
        rules,
    );

    let app = am_popcorn_storefront::build_router(state, session_layer)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
