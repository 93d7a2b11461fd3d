//! Admin sign-in route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_admin, set_current_admin};
use crate::models::{CurrentAdmin, session_keys};
use crate::services::auth::AdminAuthService;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The signed-in admin.
#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub email: String,
}

/// `POST /auth/login`
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AdminResponse>> {
    let auth = AdminAuthService::new(state.admins(), &state.config().admin_allowed_emails);

    let admin = match auth.login(&body.email, &body.password).await {
        Ok(admin) => admin,
        Err(e) => {
            tracing::warn!(error = %e, "admin login failed");
            return Err(e.into());
        }
    };

    set_current_admin(&session, &admin)
        .await
        .map_err(|e| AppError::Internal(format!("failed to store admin session: {e}")))?;
    set_sentry_user(admin.email.as_str());
    tracing::info!(admin = %admin.email, "admin signed in");

    Ok(Json(AdminResponse {
        email: admin.email.as_str().to_owned(),
    }))
}

/// `POST /auth/logout`
///
/// Only the admin identity is dropped; a cart held in the same session
/// survives.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> StatusCode {
    if let Ok(Some(admin)) = session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
    {
        tracing::info!(admin = %admin.email, "admin signed out");
    }

    if let Err(e) = clear_current_admin(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    if let Err(e) = session.cycle_id().await {
        tracing::error!("Failed to cycle session id: {}", e);
    }
    clear_sentry_user();

    StatusCode::NO_CONTENT
}
