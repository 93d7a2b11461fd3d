//! Product route handlers.
//!
//! The kiosk renders straight from these views: a one-off snapshot for the
//! first paint and a Server-Sent Events stream that pushes the whole catalog
//! again whenever any product changes.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Serialize;
use tracing::instrument;

use am_popcorn_core::Product;

use crate::error::Result;
use crate::state::AppState;

/// SSE event name carrying a catalog snapshot.
const CATALOG_EVENT: &str = "catalog";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Product as shown on the kiosk.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub in_stock: bool,
    pub price_display: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            in_stock: product.in_stock(),
            price_display: product.price.to_string(),
            product,
        }
    }
}

fn views<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<ProductView> {
    products.into_iter().cloned().map(ProductView::from).collect()
}

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<ProductView>>> {
    let products = state.catalog().list_products().await?;
    Ok(Json(views(&products)))
}

/// `GET /api/products/stream`
///
/// The first event is the current catalog; every later event is a full
/// snapshot published by the store. Disconnecting drops the subscription.
#[instrument(skip(state))]
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    // Subscribe before reading so no change falls between the two
    let mut subscription = state.catalog().subscribe();
    let initial = state.catalog().list_products().await;

    let events = async_stream::stream! {
        match initial {
            Ok(products) => {
                if let Some(event) = catalog_event(&products) {
                    yield Ok(event);
                }
            }
            Err(e) => tracing::warn!(error = %e, "initial catalog snapshot failed"),
        }

        while let Some(snapshot) = subscription.next().await {
            if let Some(event) = catalog_event(&snapshot.products) {
                yield Ok(event);
            }
        }
        tracing::debug!("catalog stream closed");
    };

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn catalog_event(products: &[Product]) -> Option<Event> {
    Event::default()
        .event(CATALOG_EVENT)
        .json_data(views(products))
        .map_err(|e| tracing::error!(error = %e, "failed to encode catalog event"))
        .ok()
}
