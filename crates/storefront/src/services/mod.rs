//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart engine: stock-reconciled cart operations
//! - `carts` - Registry of live carts keyed by session cart id
//! - `checkout` - WhatsApp order hand-off
//! - `auth` - Admin authentication (password + allow-list)

pub mod auth;
pub mod cart;
pub mod carts;
pub mod checkout;

pub use cart::{CartEngine, CartError, CartSettings, CartSnapshot, CheckoutReceipt};
pub use carts::CartRegistry;
