//! HTTP-facing error type.
//!
//! Every handler returns `Result<_, ApiError>`. Module errors convert into it with `?`, and
//! the response is always `{"error": "<message>"}` with a matching status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde_json::json;
use smm_upstream::{CryptoGatewayError, ProviderClientError};

use crate::auth::AuthError;
use crate::identity::IdentityError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    /// `required` is known when the caller priced the debit itself.
    #[error("insufficient balance")]
    InsufficientBalance {
        required: Option<Decimal>,
        available: Decimal,
    },
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unavailable(String),
    /// Message is logged, never sent.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                json!({ "error": "internal server error" })
            }
            ApiError::InsufficientBalance {
                required,
                available,
            } => {
                let mut body = json!({
                    "error": self.to_string(),
                    "available": available.to_string(),
                });
                if let Some(required) = required {
                    body["required"] = json!(required.to_string());
                }
                body
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::not_found(what),
            StoreError::Conflict(message) => ApiError::Conflict(message),
            StoreError::InsufficientBalance { available } => ApiError::InsufficientBalance {
                required: None,
                available,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden => ApiError::Forbidden(err.to_string()),
            AuthError::Store(err) => err.into(),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected { status, message } if status.is_client_error() => {
                ApiError::BadRequest(message)
            }
            other => {
                tracing::warn!(error = %other, "Identity provider failed");
                ApiError::Upstream("authentication service is unavailable".to_string())
            }
        }
    }
}

impl From<ProviderClientError> for ApiError {
    fn from(err: ProviderClientError) -> Self {
        tracing::warn!(error = %err, "Provider call failed");
        ApiError::Upstream(err.customer_message())
    }
}

impl From<CryptoGatewayError> for ApiError {
    fn from(err: CryptoGatewayError) -> Self {
        match err {
            CryptoGatewayError::InvalidSignature => ApiError::Unauthorized(err.to_string()),
            CryptoGatewayError::MalformedIpn(_) | CryptoGatewayError::InvalidAmount(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => {
                tracing::warn!(error = %other, "Crypto gateway failed");
                ApiError::Upstream("payment gateway is unavailable".to_string())
            }
        }
    }
}
