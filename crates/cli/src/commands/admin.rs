//! Admin account management commands.
//!
//! # Usage
//!
//! ```bash
//! popcorn-cli admin create -e admin@ampopcorn.com.ar -p 'a long password'
//! popcorn-cli admin list
//! popcorn-cli admin delete -e admin@ampopcorn.com.ar
//! ```
//!
//! An account alone does not grant access: the email must also be listed in
//! `ADMIN_ALLOWED_EMAILS` for the running storefront.

use am_popcorn_core::{Email, EmailError};
use am_popcorn_storefront::db::{AdminUserRepository, RepositoryError};
use am_popcorn_storefront::services::auth::{AuthError, hash_password, validate_password};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("{0}")]
    Password(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create an admin account, replacing the password if it already exists.
pub async fn create(email: &str, password: &str) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    validate_password(password)?;
    let hash = hash_password(password)?;

    let repo = AdminUserRepository::new(connect().await?);
    repo.upsert(&email, &hash).await?;

    tracing::info!(%email, "Admin account saved");
    tracing::warn!("Remember to add {email} to ADMIN_ALLOWED_EMAILS");
    Ok(())
}

/// Log every admin account.
pub async fn list() -> Result<(), AdminError> {
    let repo = AdminUserRepository::new(connect().await?);
    let accounts = repo.list_all().await?;

    tracing::info!("{} admin account(s)", accounts.len());
    for account in accounts {
        tracing::info!("  {} (created {})", account.email, account.created_at);
    }
    Ok(())
}

/// Delete an admin account.
pub async fn delete(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let repo = AdminUserRepository::new(connect().await?);
    repo.delete(&email).await?;

    tracing::info!(%email, "Admin account deleted");
    Ok(())
}
