//! Checkout route handlers.
//!
//! The pay action runs one checkout attempt to completion and answers with
//! the attempt report. A `Bearer` token marks the shopper as signed in and
//! authenticates the Saleor calls of the attempt.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, header},
};
use guestpay_core::{CheckoutId, CheckoutSession};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::instrument;

use crate::checkout::{AttemptOutcome, AttemptRequest, run_attempt};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Body of the pay action.
///
/// Carries the chosen password, so it has no `Debug` impl.
#[derive(Deserialize)]
pub struct PayRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub create_account: bool,
}

/// Run one checkout attempt.
///
/// # Errors
///
/// - 400 for a blank checkout ID or malformed `Authorization` header
/// - 422 when the guest user form is invalid
/// - 409 when registration is rejected or the attempt is in the wrong state
/// - 502 when Saleor fails
/// - 504 when the attempt does not settle in time
#[instrument(skip_all)]
pub async fn pay(
    State(state): State<AppState>,
    Path(checkout_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<PayRequest>,
) -> Result<Json<AttemptOutcome>> {
    if checkout_id.trim().is_empty() {
        return Err(AppError::BadRequest("checkout ID is required".to_string()));
    }
    let checkout_id = CheckoutId::new(checkout_id);
    let customer_token = bearer_token(&headers)?;
    let config = state.config();

    let mut checkout =
        CheckoutSession::guest(checkout_id.clone(), config.saleor.channel.clone(), None);
    if customer_token.is_some() {
        checkout = checkout.authenticated();
    }

    add_breadcrumb(
        "checkout",
        "Pay submitted",
        Some(&[
            ("checkout_id", checkout_id.as_str()),
            ("authenticated", if checkout.authenticated { "true" } else { "false" }),
        ]),
    );

    let api = state.checkout_api().session(customer_token);
    let settings = config.attempt_settings(&checkout_id);
    let outcome = run_attempt(
        api,
        AttemptRequest {
            checkout,
            email: request.email,
            password: SecretString::from(request.password.unwrap_or_default()),
            create_account: request.create_account,
        },
        &settings,
    )
    .await?;

    Ok(Json(outcome))
}

/// Extract the customer token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<Option<SecretString>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("malformed Authorization header".to_string()))?;

    Ok(Some(SecretString::from(token.to_string())))
}
