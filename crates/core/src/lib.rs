//! AM Popcorn Core - Shared types library.
//!
//! This crate provides the domain types used across the AM Popcorn components:
//! - `storefront` - Kiosk storefront and admin HTTP service
//! - `cli` - Command-line tools for migrations, seeding and admin accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Stock reconciliation against the catalog store lives
//! in the storefront crate; everything here can be evaluated synchronously.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails and products
//! - [`discount`] - Discount codes and the discount computation
//! - [`cart`] - The cart state and its derived totals
//! - [`seed`] - The kiosk's initial catalog

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod discount;
pub mod seed;
pub mod types;

pub use cart::{CartItem, CartState, CartTotals};
pub use discount::{DiscountKind, DiscountRule, DiscountRules};
pub use types::*;
