//! Session-related types.

use serde::{Deserialize, Serialize};

use am_popcorn_core::Email;

/// Session-stored admin identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Admin's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";

    /// Key for storing the shopper's cart id.
    pub const CART_ID: &str = "cart_id";
}
