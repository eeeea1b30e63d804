//! Account sign-up and sign-in against Supabase Auth (GoTrue).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: IdentityUser,
}

/// Result of a sign-up. `session` is `None` while the email address awaits confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignUp {
    pub user: IdentityUser,
    pub session: Option<Session>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUp, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;
}

/// GoTrue error bodies come in a few shapes depending on the endpoint and version.
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GoTrueError {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
    }
}

#[derive(Clone, Debug)]
pub struct GoTrueClient {
    signup_url: Url,
    token_url: Url,
    anon_key: String,
    client: Client,
    timeout: Duration,
}

impl GoTrueClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// `url` is the Supabase project URL.
    pub fn try_new(url: &Url, anon_key: impl Into<String>) -> Result<Self, IdentityError> {
        let base = url.join("auth/v1/").map_err(|e| IdentityError::UrlParse {
            context: "Failed to construct auth/v1/ URL",
            source: e,
        })?;
        let signup_url = base.join("signup").map_err(|e| IdentityError::UrlParse {
            context: "Failed to construct signup URL",
            source: e,
        })?;
        let mut token_url = base.join("token").map_err(|e| IdentityError::UrlParse {
            context: "Failed to construct token URL",
            source: e,
        })?;
        token_url.set_query(Some("grant_type=password"));
        Ok(Self {
            signup_url,
            token_url,
            anon_key: anon_key.into(),
            client: Client::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    async fn post(
        &self,
        context: &'static str,
        url: &Url,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, IdentityError> {
        let response = self
            .client
            .post(url.clone())
            .header("apikey", &self.anon_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::Http { context, source: e })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::ResponseBodyRead { context, source: e })?;

        if !status.is_success() {
            let message = serde_json::from_str::<GoTrueError>(&text)
                .ok()
                .and_then(GoTrueError::into_message)
                .unwrap_or_else(|| format!("authentication failed with status {status}"));
            tracing::warn!(%status, message = %message, context, "GoTrue rejected request");
            return Err(IdentityError::Rejected { status, message });
        }
        serde_json::from_str(&text)
            .map_err(|e| IdentityError::JsonDeserialization { context, source: e })
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUp, IdentityError> {
        let context = "POST /auth/v1/signup";
        let mut body = json!({ "email": email, "password": password });
        if let Some(username) = username {
            body["data"] = json!({ "username": username });
        }
        let value = self.post(context, &self.signup_url, &body).await?;
        // With email confirmation on, GoTrue answers with the bare user.
        if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)
                .map_err(|e| IdentityError::JsonDeserialization { context, source: e })?;
            Ok(SignUp {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user: IdentityUser = serde_json::from_value(value)
                .map_err(|e| IdentityError::JsonDeserialization { context, source: e })?;
            Ok(SignUp {
                user,
                session: None,
            })
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let context = "POST /auth/v1/token";
        let body = json!({ "email": email, "password": password });
        let value = self.post(context, &self.token_url, &body).await?;
        serde_json::from_value(value)
            .map_err(|e| IdentityError::JsonDeserialization { context, source: e })
    }
}
