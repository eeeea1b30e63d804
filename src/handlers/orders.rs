//! Catalog browsing and customer orders.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use smm_types::catalog::Service;
use smm_types::order::{Order, OrderFilter};
use smm_types::page::Page;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::orders::PlaceOrder;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub category: Option<String>,
}

/// `GET /services`
pub async fn get_services(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<Service>>, ApiError> {
    let services = state
        .catalog
        .services(true, query.category.as_deref())
        .await?;
    Ok(Json(services))
}

/// `GET /orders`
pub async fn get_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let filter = OrderFilter {
        user_id: Some(user.id),
        ..filter
    };
    Ok(Json(state.store.list_orders(&filter, page).await?))
}

/// `POST /orders`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn post_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<PlaceOrder>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.orders.place_order(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn own_order(state: &AppState, user: &AuthUser, id: i64) -> Result<Order, ApiError> {
    state
        .store
        .get_order(id)
        .await?
        .filter(|order| order.user_id == user.id)
        .ok_or_else(|| ApiError::not_found("order"))
}

/// `GET /orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(own_order(&state, &user, id).await?))
}

/// `POST /orders/{id}/refresh`
#[instrument(skip_all, fields(order_id = id))]
pub async fn post_order_refresh(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    let order = own_order(&state, &user, id).await?;
    Ok(Json(state.orders.refresh_order(order).await?))
}
