//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `am_popcorn`
//!
//! ## Tables
//!
//! - `storefront.product` - Catalog and stock (see [`crate::catalog::PgCatalogStore`])
//! - `storefront.admin_user` - Admin accounts (email + Argon2 hash)
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p am-popcorn-cli -- migrate
//! ```

pub mod admin_users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use am_popcorn_core::Email;

pub use admin_users::{AdminUserRepository, MemoryAdminUsers};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Lookup of admin password hashes.
#[async_trait]
pub trait AdminCredentialStore: Send + Sync {
    /// The stored Argon2 hash for `email`, if the account exists.
    async fn password_hash(&self, email: &Email) -> Result<Option<String>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
