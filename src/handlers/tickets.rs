//! Customer side of support tickets.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use smm_types::page::Page;
use smm_types::ticket::{Ticket, TicketFilter, TicketThread};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tickets::{Actor, OpenTicket, Reply};

/// `GET /tickets`
pub async fn get_tickets(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let filter = TicketFilter {
        user_id: Some(user.id),
        ..filter
    };
    Ok(Json(state.store.list_tickets(&filter, page).await?))
}

/// `POST /tickets`
pub async fn post_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<OpenTicket>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = state.tickets.open(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

/// `GET /tickets/{id}`
pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TicketThread>, ApiError> {
    Ok(Json(state.tickets.thread(Actor::Customer(user.id), id).await?))
}

/// `POST /tickets/{id}/messages`
pub async fn post_ticket_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<Reply>,
) -> Result<Json<TicketThread>, ApiError> {
    let thread = state
        .tickets
        .reply(Actor::Customer(user.id), id, body)
        .await?;
    Ok(Json(thread))
}

/// `POST /tickets/{id}/close`
pub async fn post_ticket_close(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.tickets.close(Actor::Customer(user.id), id).await?))
}
