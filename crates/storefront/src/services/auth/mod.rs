//! Admin authentication.
//!
//! Admins sign in with email and password. Both checks must pass: the
//! password must match the stored Argon2id hash, and the email must be on the
//! configured allow-list. An account that exists in the database but has been
//! taken off the allow-list cannot sign in.

mod error;

pub use error::AuthError;

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use am_popcorn_core::Email;

use crate::config::AdminAllowList;
use crate::db::AdminCredentialStore;
use crate::models::CurrentAdmin;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Checked against when the email has no account, so unknown and known
/// emails cost the same Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-admin-account").ok());

/// Authentication service for the admin surface.
pub struct AdminAuthService<'a> {
    credentials: &'a dyn AdminCredentialStore,
    allow_list: &'a AdminAllowList,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        credentials: &'a dyn AdminCredentialStore,
        allow_list: &'a AdminAllowList,
    ) -> Self {
        Self {
            credentials,
            allow_list,
        }
    }

    /// Check an email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidCredentials` if the account does not exist or
    /// the password is wrong.
    /// Returns `AuthError::NotAllowed` if the email is not on the allow-list.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<CurrentAdmin, AuthError> {
        let email = Email::parse(email)?;

        let Some(hash) = self.credentials.password_hash(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(AuthError::InvalidCredentials);
        };
        verify_password(password, &hash)?;

        if !self.allow_list.contains(&email) {
            tracing::warn!(%email, "admin login refused: not on allow-list");
            return Err(AuthError::NotAllowed);
        }

        Ok(CurrentAdmin { email })
    }
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryAdminUsers;

    async fn users_with(email: &str, password: &str) -> MemoryAdminUsers {
        let users = MemoryAdminUsers::new();
        users
            .upsert(Email::parse(email).unwrap(), hash_password(password).unwrap())
            .await;
        users
    }

    #[tokio::test]
    async fn test_login_requires_password_and_allow_list() {
        let users = users_with("encargada@kiosco.org", "pochoclos-2024").await;
        let allowed = AdminAllowList::parse("encargada@kiosco.org").unwrap();
        let service = AdminAuthService::new(&users, &allowed);

        let admin = service
            .login("Encargada@Kiosco.org", "pochoclos-2024")
            .await
            .unwrap();
        assert_eq!(admin.email.as_str(), "encargada@kiosco.org");

        assert!(matches!(
            service.login("encargada@kiosco.org", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nadie@kiosco.org", "pochoclos-2024").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("not-an-email", "pochoclos-2024").await,
            Err(AuthError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_login_refused_when_not_allowed() {
        let users = users_with("ex-encargada@kiosco.org", "pochoclos-2024").await;
        let allowed = AdminAllowList::parse("encargada@kiosco.org").unwrap();
        let service = AdminAuthService::new(&users, &allowed);

        assert!(matches!(
            service
                .login("ex-encargada@kiosco.org", "pochoclos-2024")
                .await,
            Err(AuthError::NotAllowed)
        ));
    }

    #[test]
    fn test_unknown_accounts_verify_against_a_real_hash() {
        let dummy = DUMMY_HASH.as_deref().unwrap();
        assert!(PasswordHash::new(dummy).is_ok());
        assert!(matches!(
            verify_password("pochoclos-2024", dummy),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long-enough").is_ok());
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("pochoclos-2024").unwrap();
        let b = hash_password("pochoclos-2024").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("pochoclos-2024", &a).is_ok());
    }
}
