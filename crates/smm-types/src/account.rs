//! Customer accounts and the balance ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Access level of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A storefront account. The id is the Supabase auth user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    pub balance: Decimal,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Deposit,
    OrderCharge,
    Refund,
    Adjustment,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Deposit => "deposit",
            LedgerKind::OrderCharge => "order_charge",
            LedgerKind::Refund => "refund",
            LedgerKind::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signed movement of a profile balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: LedgerKind,
    #[serde(default)]
    pub reference: Option<String>,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Ledger reference for movements caused by an order.
pub fn order_reference(order_id: i64) -> String {
    format!("order:{order_id}")
}

/// Ledger reference for movements caused by a payment.
pub fn payment_reference(payment_id: i64) -> String {
    format!("payment:{payment_id}")
}
