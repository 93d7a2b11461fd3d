//! Authentication extractors for the admin API.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in, allow-listed admin.
///
/// The allow-list is checked on every request, so removing an address from
/// `ADMIN_ALLOWED_EMAILS` revokes access without touching sessions.
///
/// # Example
///
/// ```rust,ignore
/// async fn restock(
///     State(state): State<AppState>,
///     RequireAdmin(admin): RequireAdmin,
/// ) -> Result<StatusCode> {
///     tracing::info!(admin = %admin.email, "restocking");
///     // ...
/// }
/// ```
pub struct RequireAdmin(pub CurrentAdmin);

/// Error returned when an admin is required.
#[derive(Debug)]
pub enum AuthRejection {
    /// No admin in the session.
    Unauthorized,
    /// Signed in, but no longer on the allow-list.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Sign in to manage the catalog",
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "This account cannot manage the catalog",
            ),
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let admin: CurrentAdmin = session
            .get(session_keys::CURRENT_ADMIN)
            .await
            .ok()
            .flatten()
            .ok_or(AuthRejection::Unauthorized)?;

        if !state.config().admin_allowed_emails.contains(&admin.email) {
            tracing::warn!(admin = %admin.email, "admin no longer allow-listed");
            return Err(AuthRejection::Forbidden);
        }

        Ok(Self(admin))
    }
}

/// Store the signed-in admin in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    // Fresh id on privilege change
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Remove the admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}
