//! Live catalog snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use am_popcorn_core::Product;

/// Buffered snapshots per subscriber before older ones are dropped.
pub(crate) const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// The whole catalog at one point in time.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub products: Arc<Vec<Product>>,
    pub taken_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(products),
            taken_at: Utc::now(),
        }
    }
}

/// Handle on the stream of catalog snapshots.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) stops
/// delivery. A subscriber that falls behind skips straight to the newest
/// snapshots; intermediate ones are not replayed.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<CatalogSnapshot>,
}

impl Subscription {
    pub(crate) const fn new(receiver: broadcast::Receiver<CatalogSnapshot>) -> Self {
        Self { receiver }
    }

    /// Wait for the next snapshot. Returns `None` once the store has shut down.
    pub async fn next(&mut self) -> Option<CatalogSnapshot> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "catalog subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving snapshots.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
