//! A client for upstream SMM providers speaking the common "API v2" dialect.
//!
//! Every call is a form-encoded `POST` to a single endpoint, authenticated by a `key`
//! field and dispatched on an `action` field:
//!
//! | action | extra fields | response |
//! |--------|--------------|----------|
//! | `services` | – | `[{"service":1,"name":..,"rate":"0.90","min":"50",..}]` |
//! | `add` | `service`, `link`, `quantity` | `{"order": 23501}` |
//! | `status` | `order` | `{"charge":"0.27819","start_count":"3572","status":"Partial","remains":"157","currency":"USD"}` |
//! | `balance` | – | `{"balance":"100.84","currency":"USD"}` |
//! | `cancel` | `orders` | `[{"order": 2, "cancel": 1}]` |
//!
//! Providers report failures as `{"error": "..."}`, usually with a `200 OK` status.
//! Those surface as [`ProviderClientError::Rejected`].

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;
use tracing::Instrument;
use url::Url;

use crate::de::{lenient_count, string_or_number};

/// A service as listed by the provider.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderService {
    #[serde(deserialize_with = "string_or_number")]
    pub service: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: String,
    pub rate: Decimal,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub min: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub max: u32,
    #[serde(default)]
    pub refill: bool,
    #[serde(default)]
    pub cancel: bool,
}

/// Progress of an upstream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOrderStatus {
    #[serde(default)]
    pub charge: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub start_count: Option<u64>,
    pub status: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub remains: Option<u64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderBalance {
    pub balance: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddOrderResponse {
    #[serde(deserialize_with = "string_or_number")]
    order: String,
}

#[derive(Debug, Deserialize)]
struct CancelResult {
    cancel: serde_json::Value,
}

/// Errors that can occur while talking to a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderClientError {
    #[error("HTTP error: {context}: {source}")]
    Http {
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
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Provider rejected {context}: {message}")]
    Rejected {
        context: &'static str,
        message: String,
    },
}

impl ProviderClientError {
    /// Message suitable for showing to the customer whose order failed.
    pub fn customer_message(&self) -> String {
        match self {
            ProviderClientError::Rejected { message, .. } => message.clone(),
            _ => "provider is unreachable".to_string(),
        }
    }
}

/// A client for one upstream provider.
#[derive(Clone, Debug)]
pub struct ProviderClient {
    id: String,
    api_url: Url,
    api_key: String,
    client: Client,
    timeout: Option<Duration>,
}

impl ProviderClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(id: impl Into<String>, api_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api_url,
            api_key: api_key.into(),
            client: Client::new(),
            timeout: Some(Self::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn services(&self) -> Result<Vec<ProviderService>, ProviderClientError> {
        self.call("services", &[]).await
    }

    /// Submits an order and returns the provider's order id.
    pub async fn add_order(
        &self,
        service: &str,
        link: &str,
        quantity: u32,
    ) -> Result<String, ProviderClientError> {
        let quantity = quantity.to_string();
        let response: AddOrderResponse = self
            .call(
                "add",
                &[("service", service), ("link", link), ("quantity", &quantity)],
            )
            .await?;
        Ok(response.order)
    }

    pub async fn order_status(
        &self,
        order: &str,
    ) -> Result<ProviderOrderStatus, ProviderClientError> {
        self.call("status", &[("order", order)]).await
    }

    pub async fn balance(&self) -> Result<ProviderBalance, ProviderClientError> {
        self.call("balance", &[]).await
    }

    /// Asks the provider to cancel an order. Not every provider supports this.
    pub async fn cancel(&self, order: &str) -> Result<(), ProviderClientError> {
        let results: Vec<CancelResult> = self.call("cancel", &[("orders", order)]).await?;
        let outcome = results.into_iter().next().map(|r| r.cancel);
        match outcome.as_ref().and_then(rejection_message) {
            Some(message) => Err(ProviderClientError::Rejected {
                context: "cancel",
                message,
            }),
            None if outcome.is_none() => Err(ProviderClientError::Rejected {
                context: "cancel",
                message: "empty cancel response".to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Posts `action` with `fields` and decodes the response, mapping `{"error": ..}` bodies.
    async fn call<R>(
        &self,
        action: &'static str,
        fields: &[(&str, &str)],
    ) -> Result<R, ProviderClientError>
    where
        R: DeserializeOwned,
    {
        let span = tracing::info_span!("smm.provider.call", provider = %self.id, action);
        let result = self.post_form(action, fields).instrument(span).await;
        record_result(&self.id, action, &result);
        result
    }

    async fn post_form<R>(
        &self,
        context: &'static str,
        fields: &[(&str, &str)],
    ) -> Result<R, ProviderClientError>
    where
        R: DeserializeOwned,
    {
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(fields.len() + 2);
        form.push(("key", self.api_key.as_str()));
        form.push(("action", context));
        form.extend_from_slice(fields);

        let mut req = self.client.post(self.api_url.clone()).form(&form);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ProviderClientError::Http { context, source: e })?;

        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|e| ProviderClientError::ResponseBodyRead { context, source: e })?;

        let value: Option<serde_json::Value> = serde_json::from_str(&body).ok();
        if let Some(message) = value.as_ref().and_then(rejection_message) {
            return Err(ProviderClientError::Rejected { context, message });
        }
        if !status.is_success() {
            return Err(ProviderClientError::HttpStatus {
                context,
                status,
                body,
            });
        }
        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ProviderClientError::JsonDeserialization { context, source: e }),
            None => serde_json::from_str(&body)
                .map_err(|e| ProviderClientError::JsonDeserialization { context, source: e }),
        }
    }
}

/// Extracts the message from an `{"error": ..}` object.
fn rejection_message(value: &serde_json::Value) -> Option<String> {
    let error = value.as_object()?.get("error")?;
    match error {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn record_result<R, E: Display>(provider: &str, action: &str, result: &Result<R, E>) {
    if let Err(err) = result {
        tracing::warn!(provider, action, error = %err, "Provider call failed");
    }
}

/// Configured providers keyed by id.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderClient>,
}

impl ProviderRegistry {
    pub fn new(providers: impl IntoIterator<Item = ProviderClient>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.id().to_string(), p))
            .collect();
        Self { providers }
    }

    pub fn by_id(&self, id: &str) -> Option<&ProviderClient> {
        self.providers.get(id)
    }
}
