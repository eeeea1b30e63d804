//! Bearer-token authentication.
//!
//! Supabase signs access tokens with the project's JWT secret (HS256, audience
//! `authenticated`). [`AuthUser`] verifies the token on every request; [`AdminUser`]
//! additionally requires the `admin` role or a configured admin email.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, request::Parts};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use smm_types::account::Role;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::StoreError;

pub const AUDIENCE: &str = "authenticated";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("admin access required")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Claims carried by a Supabase access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    /// Postgres role, `authenticated` for signed-in users.
    #[serde(default)]
    pub role: Option<String>,
    pub exp: u64,
    #[serde(default)]
    pub aud: Option<String>,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e),
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.trim())
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.jwt.verify(token).inspect_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
        })?;
        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
        })
    }
}

/// A signed-in user with admin rights.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if is_admin(state, &user).await? {
            Ok(AdminUser(user))
        } else {
            tracing::warn!(user_id = %user.id, "Admin route refused");
            Err(AuthError::Forbidden.into())
        }
    }
}

async fn is_admin(state: &AppState, user: &AuthUser) -> Result<bool, AuthError> {
    let listed = user.email.as_deref().is_some_and(|email| {
        state
            .admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    });
    if listed {
        return Ok(true);
    }
    let profile = state.store.get_profile(user.id).await?;
    Ok(profile.is_some_and(|p| p.role == Role::Admin))
}

#[cfg(test)]
pub(crate) fn test_token(secret: &str, user: Uuid, email: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let claims = Claims {
        sub: user,
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        exp: chrono::Utc::now().timestamp() as u64 + 3600,
        aud: Some(AUDIENCE.to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
