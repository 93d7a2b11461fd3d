//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON body:
//!
//! ```json
//! { "error": "insufficient_stock", "message": "only 2 left of Jugo de Manzana" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::db::RepositoryError;
use crate::services::CartError;
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Catalog store operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartError::OutOfStock { .. } | CartError::InsufficientStock { .. } => {
                    StatusCode::CONFLICT
                }
                CartError::InvalidDiscountCode(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CartError::EmptyCart => StatusCode::BAD_REQUEST,
                CartError::StockSyncFailed { .. } | CartError::CheckoutFailed { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Catalog(err) => match err {
                CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
                CatalogError::InsufficientStock { .. } | CatalogError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                CatalogError::RemoteWriteFailed(_) | CatalogError::Unavailable(_) => {
                    StatusCode::BAD_GATEWAY
                }
                CatalogError::DataCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::NotAllowed => StatusCode::FORBIDDEN,
                AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Cart(err) => match err {
                CartError::OutOfStock { .. } => "out_of_stock",
                CartError::InsufficientStock { .. } => "insufficient_stock",
                CartError::InvalidDiscountCode(_) => "invalid_discount_code",
                CartError::EmptyCart => "empty_cart",
                CartError::StockSyncFailed { .. } => "stock_sync_failed",
                CartError::CheckoutFailed { .. } => "checkout_failed",
            },
            Self::Catalog(err) => match err {
                CatalogError::NotFound(_) => "not_found",
                CatalogError::InsufficientStock { .. } => "insufficient_stock",
                CatalogError::Conflict(_) => "conflict",
                CatalogError::RemoteWriteFailed(_) => "remote_write_failed",
                CatalogError::Unavailable(_) => "store_unavailable",
                CatalogError::DataCorruption(_) => "internal",
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "invalid_credentials",
                AuthError::NotAllowed => "forbidden",
                AuthError::InvalidEmail(_) => "invalid_email",
                AuthError::WeakPassword(_) => "weak_password",
                AuthError::Repository(_) | AuthError::PasswordHash => "internal",
            },
            Self::Database(_) | Self::Internal(_) => "internal",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Cart(err) => err.to_string(),
            Self::Catalog(CatalogError::DataCorruption(_)) | Self::Database(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Catalog(CatalogError::RemoteWriteFailed(_) | CatalogError::Unavailable(_)) => {
                "The catalog is temporarily unavailable".to_string()
            }
            Self::Catalog(err) => err.to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::NotAllowed => "This account cannot manage the catalog".to_string(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(why) | Self::BadRequest(why) => why.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = json!({
            "error": self.kind(),
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for a signed-in admin.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the admin.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use am_popcorn_core::ProductId;

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_cart_error_status_codes() {
        fn get_status(err: CartError) -> StatusCode {
            AppError::from(err).into_response().status()
        }

        assert_eq!(
            get_status(CartError::OutOfStock {
                product_id: ProductId::new("1"),
                name: "Pochoclos".to_string(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CartError::InvalidDiscountCode("NOPE".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(get_status(CartError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(CartError::CheckoutFailed {
                failed: vec![ProductId::new("2")],
                source: CatalogError::RemoteWriteFailed("timeout".to_string()),
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_other_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(CatalogError::NotFound(ProductId::new("9")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::NotAllowed.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Catalog(CatalogError::RemoteWriteFailed(
            "connection refused at 10.0.0.3".to_string(),
        ));
        assert_eq!(err.kind(), "remote_write_failed");
        assert!(!err.public_message().contains("10.0.0.3"));
    }
}
