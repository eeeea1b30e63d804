//! Sign-up, sign-in, profile and balance history.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use smm_types::account::{LedgerEntry, NewProfile, Profile};
use smm_types::page::Page;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::identity::{Session, SignUp};
use crate::state::AppState;
use crate::store::{Store, StoreError};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn clean_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_ascii_lowercase())
        }
        _ => Err(ApiError::validation("a valid email address is required")),
    }
}

fn clean_username(username: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(username) = username.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let valid = username.chars().count() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    if !valid {
        return Err(ApiError::validation(format!(
            "username must be at most {MAX_USERNAME_LEN} letters, digits, '.', '_' or '-'"
        )));
    }
    Ok(Some(username.to_string()))
}

/// Returns the profile for `profile.id`, creating it when missing.
pub(crate) async fn ensure_profile(
    store: &dyn Store,
    profile: NewProfile,
) -> Result<Profile, ApiError> {
    if let Some(existing) = store.get_profile(profile.id).await? {
        return Ok(existing);
    }
    let id = profile.id;
    match store.create_profile(profile).await {
        Ok(created) => {
            tracing::info!(user_id = %created.id, "Profile created");
            Ok(created)
        }
        // Lost a race with a concurrent request for the same user.
        Err(StoreError::Conflict(_)) => store
            .get_profile(id)
            .await?
            .ok_or_else(|| ApiError::not_found("profile")),
        Err(err) => Err(err.into()),
    }
}

/// `POST /auth/signup`
#[instrument(skip_all)]
pub async fn post_signup(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = clean_email(&body.email)?;
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let username = clean_username(body.username.as_deref())?;

    let outcome: SignUp = state
        .identity
        .sign_up(&email, &body.password, username.as_deref())
        .await?;
    ensure_profile(
        state.store.as_ref(),
        NewProfile {
            id: outcome.user.id,
            email: outcome.user.email.clone().unwrap_or(email),
            username,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /auth/login`
#[instrument(skip_all)]
pub async fn post_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Session>, ApiError> {
    let email = clean_email(&body.email)?;
    let session = state.identity.sign_in(&email, &body.password).await?;
    Ok(Json(session))
}

/// `GET /auth/me`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Profile>, ApiError> {
    let profile = ensure_profile(
        state.store.as_ref(),
        NewProfile {
            id: user.id,
            email: user.email.unwrap_or_default(),
            username: None,
        },
    )
    .await?;
    Ok(Json(profile))
}

/// `GET /balance/ledger`
pub async fn get_ledger(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    Ok(Json(state.store.list_ledger(user.id, page).await?))
}
