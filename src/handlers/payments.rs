//! Customer top-ups and the crypto gateway webhook.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;
use smm_types::page::Page;
use smm_types::payment::{Payment, PaymentFilter};
use smm_upstream::crypto::IPN_SIGNATURE_HEADER;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::payments::{CryptoDeposit, ManualPayment};
use crate::state::AppState;

/// `GET /payments`
pub async fn get_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let filter = PaymentFilter {
        user_id: Some(user.id),
        ..filter
    };
    Ok(Json(state.store.list_payments(&filter, page).await?))
}

/// `POST /payments/manual`
pub async fn post_manual_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ManualPayment>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.payments.submit_manual(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `POST /payments/crypto`
pub async fn post_crypto_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CryptoDeposit>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.payments.create_crypto_invoice(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `POST /payments/crypto/callback`
///
/// The body is taken raw, the signature covers its canonical form.
#[instrument(skip_all)]
pub async fn post_crypto_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(IPN_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    state.payments.handle_ipn(&body, signature).await?;
    Ok(Json(json!({ "ok": true })))
}
