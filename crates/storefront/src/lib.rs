//! AM Popcorn storefront library.
//!
//! The kiosk's backend: live catalog and stock, per-session carts with
//! discount codes, WhatsApp checkout hand-off and an admin surface for the
//! catalog. Exposed as a library so the CLI and the integration tests can
//! reuse it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use app::build_router;
