//! Crypto invoice gateway (NOWPayments-compatible).
//!
//! The storefront creates a hosted invoice per deposit and is told about its outcome
//! through signed IPN (instant payment notification) callbacks.
//!
//! IPN bodies are signed with `HMAC-SHA512(ipn_secret)` over the JSON body with its
//! object keys sorted recursively, serialized without whitespace. The hex digest arrives
//! in the `x-nowpayments-sig` header.

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::time::Duration;
use url::Url;

use crate::de::string_or_number;

type HmacSha512 = Hmac<Sha512>;

/// Decimal places amounts are settled at.
const SETTLEMENT_SCALE: u32 = 4;

/// Header carrying the IPN signature.
pub const IPN_SIGNATURE_HEADER: &str = "x-nowpayments-sig";

/// What the storefront asks the gateway to bill.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRequest {
    pub price_amount: Decimal,
    pub price_currency: String,
    /// Our payment id, echoed back in IPN callbacks.
    pub order_id: String,
    pub order_description: String,
}

#[derive(Debug, Serialize)]
struct InvoiceBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    price_amount: Decimal,
    price_currency: &'a str,
    order_id: &'a str,
    order_description: &'a str,
    ipn_callback_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    success_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel_url: Option<&'a str>,
}

/// A hosted invoice the customer is redirected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub invoice_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpnStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
    #[serde(other)]
    Other,
}

/// A verified payment notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IpnEvent {
    #[serde(deserialize_with = "string_or_number")]
    pub payment_id: String,
    pub payment_status: IpnStatus,
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    pub price_amount: Decimal,
    pub price_currency: String,
    #[serde(default)]
    pub actually_paid: Option<Decimal>,
    #[serde(default)]
    pub pay_currency: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoGatewayError {
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
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Amount {0} cannot be sent to the gateway")]
    InvalidAmount(Decimal),
    #[error("IPN signature is missing or invalid")]
    InvalidSignature,
    #[error("IPN body is malformed: {0}")]
    MalformedIpn(#[source] serde_json::Error),
}

/// Where the gateway should send the customer and its notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackUrls {
    pub ipn_callback_url: Url,
    pub success_url: Option<Url>,
    pub cancel_url: Option<Url>,
}

#[derive(Clone, Debug)]
pub struct CryptoGateway {
    invoice_url: Url,
    api_key: String,
    ipn_secret: String,
    callbacks: CallbackUrls,
    client: Client,
    timeout: Duration,
}

impl CryptoGateway {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

    /// Builds a gateway client. `api_url` is the versioned API root, e.g. `https://api.nowpayments.io/v1/`.
    pub fn try_new(
        api_url: &Url,
        api_key: impl Into<String>,
        ipn_secret: impl Into<String>,
        callbacks: CallbackUrls,
    ) -> Result<Self, CryptoGatewayError> {
        let mut base = api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let invoice_url = base
            .join("./invoice")
            .map_err(|e| CryptoGatewayError::UrlParse {
                context: "Failed to construct ./invoice URL",
                source: e,
            })?;
        Ok(Self {
            invoice_url,
            api_key: api_key.into(),
            ipn_secret: ipn_secret.into(),
            callbacks,
            client: Client::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> Result<Invoice, CryptoGatewayError> {
        let context = "POST /invoice";
        let price_amount = request
            .price_amount
            .round_dp_with_strategy(SETTLEMENT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        if price_amount <= Decimal::ZERO {
            return Err(CryptoGatewayError::InvalidAmount(request.price_amount));
        }
        let body = InvoiceBody {
            price_amount,
            price_currency: &request.price_currency,
            order_id: &request.order_id,
            order_description: &request.order_description,
            ipn_callback_url: self.callbacks.ipn_callback_url.as_str(),
            success_url: self.callbacks.success_url.as_ref().map(Url::as_str),
            cancel_url: self.callbacks.cancel_url.as_ref().map(Url::as_str),
        };
        let http_response = self
            .client
            .post(self.invoice_url.clone())
            .header("x-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CryptoGatewayError::Http { context, source: e })?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Invoice creation failed");
            return Err(CryptoGatewayError::HttpStatus {
                context,
                status,
                body,
            });
        }
        let invoice = http_response
            .json::<Invoice>()
            .await
            .map_err(|e| CryptoGatewayError::JsonDeserialization { context, source: e })?;
        tracing::info!(invoice_id = %invoice.id, order_id = %request.order_id, "Invoice created");
        Ok(invoice)
    }

    /// Checks the IPN signature over `body` and decodes the notification.
    pub fn verify_ipn(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<IpnEvent, CryptoGatewayError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(CryptoGatewayError::InvalidSignature)?;
        let signature = hex::decode(signature).map_err(|_| CryptoGatewayError::InvalidSignature)?;

        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(CryptoGatewayError::MalformedIpn)?;
        let canonical = canonical_json(&value);

        let mut mac = HmacSha512::new_from_slice(self.ipn_secret.as_bytes())
            .map_err(|_| CryptoGatewayError::InvalidSignature)?;
        mac.update(canonical.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CryptoGatewayError::InvalidSignature)?;

        serde_json::from_value(value).map_err(CryptoGatewayError::MalformedIpn)
    }

    /// Signs `value` the way the gateway does. Useful for tests and local replays.
    pub fn sign_ipn(&self, value: &serde_json::Value) -> Result<String, CryptoGatewayError> {
        let mut mac = HmacSha512::new_from_slice(self.ipn_secret.as_bytes())
            .map_err(|_| CryptoGatewayError::InvalidSignature)?;
        mac.update(canonical_json(value).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Compact JSON with object keys sorted at every level.
fn canonical_json(value: &serde_json::Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (key, value) in entries {
                out.insert(key.clone(), sorted(value));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sorted).collect())
        }
        other => other.clone(),
    }
}
