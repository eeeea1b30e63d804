//! Balance top-ups: manual transfers and crypto invoices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Manual,
    Crypto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Manual => "manual",
            PaymentMethod::Crypto => "crypto",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only `Pending` payments may change status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Rejected,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    /// Bank transfer reference for manual payments, gateway invoice id for crypto.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentFilter {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.user_id.is_none_or(|id| payment.user_id == id)
            && self.status.is_none_or(|s| payment.status == s)
            && self.method.is_none_or(|m| payment.method == m)
    }
}
