//! Back-office endpoints. Every handler takes an [`AdminUser`].

use axum::Json;
use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use serde::Deserialize;
use smm_types::account::{LedgerEntry, LedgerKind, Profile};
use smm_types::catalog::{Service, ServiceDraft};
use smm_types::order::{Order, OrderFilter};
use smm_types::page::Page;
use smm_types::payment::{Payment, PaymentFilter};
use smm_types::settings::Settings;
use smm_types::ticket::{Ticket, TicketFilter, TicketThread};
use smm_upstream::provider::ProviderBalance;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::catalog::SyncReport;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::StoreError;
use crate::tickets::{Actor, Reply};

pub const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct BalanceAdjustment {
    pub delta: Decimal,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Visibility {
    pub active: bool,
}

/// `GET /admin/users`
pub async fn get_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    Ok(Json(state.store.list_profiles(page).await?))
}

/// `POST /admin/users/{id}/balance`
#[instrument(skip_all, fields(admin = %admin.0.id, user_id = %user_id))]
pub async fn post_user_balance(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<BalanceAdjustment>,
) -> Result<Json<LedgerEntry>, ApiError> {
    if body.delta.is_zero() {
        return Err(ApiError::validation("delta must not be zero"));
    }
    let reason = body.reason.trim();
    if reason.is_empty() || reason.chars().count() > MAX_REASON_LEN {
        return Err(ApiError::validation(format!(
            "reason must be 1 to {MAX_REASON_LEN} characters"
        )));
    }
    let entry = state
        .store
        .apply_balance_change(
            user_id,
            body.delta,
            LedgerKind::Adjustment,
            Some(reason.to_string()),
        )
        .await
        .map_err(|err| match err {
            StoreError::InsufficientBalance { available } => ApiError::InsufficientBalance {
                required: Some(-body.delta),
                available,
            },
            other => other.into(),
        })?;
    tracing::info!(delta = %body.delta, balance = %entry.balance_after, "Balance adjusted");
    Ok(Json(entry))
}

/// `GET /admin/orders`
pub async fn get_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.store.list_orders(&filter, page).await?))
}

/// `POST /admin/orders/{id}/cancel`
pub async fn post_order_cancel(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .store
        .get_order(id)
        .await?
        .ok_or_else(|| ApiError::not_found("order"))?;
    Ok(Json(state.orders.cancel_order(order).await?))
}

/// `GET /admin/payments`
pub async fn get_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.store.list_payments(&filter, page).await?))
}

/// `POST /admin/payments/{id}/approve`
pub async fn post_payment_approve(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    body: Option<Json<Decision>>,
) -> Result<Json<Payment>, ApiError> {
    let decision = body.map(|Json(d)| d).unwrap_or_default();
    Ok(Json(state.payments.approve(id, decision.note).await?))
}

/// `POST /admin/payments/{id}/reject`
pub async fn post_payment_reject(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    body: Option<Json<Decision>>,
) -> Result<Json<Payment>, ApiError> {
    let decision = body.map(|Json(d)| d).unwrap_or_default();
    Ok(Json(state.payments.reject(id, decision.note).await?))
}

/// `GET /admin/services`
pub async fn get_services(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Service>>, ApiError> {
    Ok(Json(state.catalog.services(false, None).await?))
}

/// `POST /admin/services`
pub async fn post_service(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(draft): Json<ServiceDraft>,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(state.catalog.save_service(draft).await?))
}

/// `POST /admin/services/{id}/active`
pub async fn post_service_active(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<Visibility>,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(state.catalog.set_active(id, body.active).await?))
}

/// `POST /admin/providers/{id}/sync`
pub async fn post_provider_sync(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(provider_id): Path<String>,
) -> Result<Json<SyncReport>, ApiError> {
    Ok(Json(state.catalog.sync_provider(&provider_id).await?))
}

/// `GET /admin/providers/{id}/balance`
pub async fn get_provider_balance(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(provider_id): Path<String>,
) -> Result<Json<ProviderBalance>, ApiError> {
    Ok(Json(state.catalog.provider_balance(&provider_id).await?))
}

/// `GET /admin/tickets`
pub async fn get_tickets(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<Page>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    Ok(Json(state.store.list_tickets(&filter, page).await?))
}

/// `GET /admin/tickets/{id}`
pub async fn get_ticket(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<TicketThread>, ApiError> {
    Ok(Json(state.tickets.thread(Actor::Staff(admin.id), id).await?))
}

/// `POST /admin/tickets/{id}/messages`
pub async fn post_ticket_message(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<Reply>,
) -> Result<Json<TicketThread>, ApiError> {
    Ok(Json(state.tickets.reply(Actor::Staff(admin.id), id, body).await?))
}

/// `POST /admin/tickets/{id}/close`
pub async fn post_ticket_close(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.tickets.close(Actor::Staff(admin.id), id).await?))
}

/// `PUT /admin/settings`
#[instrument(skip_all, fields(admin = %admin.0.id))]
pub async fn put_settings(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    settings.validate().map_err(ApiError::validation)?;
    let saved = state.store.put_settings(settings).await?;
    state.public_config.clear().await;
    tracing::info!("Settings updated");
    Ok(Json(saved))
}
