//! Customer orders and their lifecycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of an order.
///
/// `Pending` and `Processing` are set by the storefront, the rest mirror the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    InProgress,
    Completed,
    Partial,
    Canceled,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Partial
                | OrderStatus::Canceled
                | OrderStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Partial => "partial",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Failed => "failed",
        }
    }

    /// Maps a status string reported by an upstream provider.
    pub fn from_provider(status: &str) -> Option<Self> {
        let normalized = status.trim().to_ascii_lowercase();
        let status = match normalized.as_str() {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "in progress" | "in_progress" | "inprogress" => OrderStatus::InProgress,
            "completed" => OrderStatus::Completed,
            "partial" => OrderStatus::Partial,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| UnknownOrderStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: Uuid,
    pub service_id: i64,
    pub link: String,
    pub quantity: u32,
    pub charge: Decimal,
    pub status: OrderStatus,
    #[serde(default)]
    pub provider_order_id: Option<String>,
    #[serde(default)]
    pub start_count: Option<u64>,
    #[serde(default)]
    pub remains: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub service_id: i64,
    pub link: String,
    pub quantity: u32,
    pub charge: Decimal,
    pub status: OrderStatus,
}

/// A partial update of an order row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remains: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrderUpdate {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(OrderStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(provider_order_id) = &self.provider_order_id {
            order.provider_order_id = Some(provider_order_id.clone());
        }
        if let Some(start_count) = self.start_count {
            order.start_count = Some(start_count);
        }
        if let Some(remains) = self.remains {
            order.remains = Some(remains);
        }
        if let Some(error) = &self.error {
            order.error = Some(error.clone());
        }
    }
}

/// Filter for order listings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.is_none_or(|user_id| order.user_id == user_id)
            && self.status.is_none_or(|status| order.status == status)
    }
}
