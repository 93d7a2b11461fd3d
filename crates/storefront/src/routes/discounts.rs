//! Discount code lookup.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DiscountCheck {
    /// Canonical code when valid, otherwise the code as given.
    pub code: String,
    pub valid: bool,
}

/// `GET /api/discounts/{code}`
///
/// Answers whether the kiosk would accept `code`, without touching any cart.
pub async fn check(State(state): State<AppState>, Path(code): Path<String>) -> Json<DiscountCheck> {
    let check = match state.carts().rules().find(&code) {
        Some(rule) => DiscountCheck {
            code: rule.code.clone(),
            valid: true,
        },
        None => DiscountCheck { code, valid: false },
    };
    Json(check)
}
