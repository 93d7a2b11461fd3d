//! Admin account storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use am_popcorn_core::Email;

use super::{AdminCredentialStore, RepositoryError};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AdminUserRow {
    email: String,
    created_at: DateTime<Utc>,
}

/// An admin account as listed by the CLI.
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub email: Email,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AdminUserRow> for AdminAccount {
    type Error = RepositoryError;

    fn try_from(row: AdminUserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            email,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for `storefront.admin_user`.
#[derive(Clone)]
pub struct AdminUserRepository {
    pool: PgPool,
}

impl AdminUserRepository {
    /// Create a new admin user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an admin or replace their password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, email: &Email, password_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.admin_user (email, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (email)
            DO UPDATE SET password_hash = EXCLUDED.password_hash, updated_at = now()
            ",
        )
        .bind(email.as_str())
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List all admin accounts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn list_all(&self) -> Result<Vec<AdminAccount>, RepositoryError> {
        let rows: Vec<AdminUserRow> = sqlx::query_as(
            "SELECT email, created_at FROM storefront.admin_user ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Delete an admin account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such admin exists.
    pub async fn delete(&self, email: &Email) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.admin_user WHERE email = $1")
            .bind(email.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminCredentialStore for AdminUserRepository {
    async fn password_hash(&self, email: &Email) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar(
            "SELECT password_hash FROM storefront.admin_user WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Admin accounts held in memory.
#[derive(Debug, Default)]
pub struct MemoryAdminUsers {
    hashes: RwLock<HashMap<Email, String>>,
}

impl MemoryAdminUsers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an admin or replace their password hash.
    pub async fn upsert(&self, email: Email, password_hash: String) {
        self.hashes.write().await.insert(email, password_hash);
    }
}

#[async_trait]
impl AdminCredentialStore for MemoryAdminUsers {
    async fn password_hash(&self, email: &Email) -> Result<Option<String>, RepositoryError> {
        Ok(self.hashes.read().await.get(email).cloned())
    }
}
