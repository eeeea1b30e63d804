//! The service catalog resold to customers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A sellable service, mirrored from an upstream provider.
///
/// `rate` is the customer price per 1000 units, markup included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub provider_id: String,
    pub provider_service_id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rate: Decimal,
    pub min: u32,
    pub max: u32,
    pub active: bool,
    #[serde(default)]
    pub refill: bool,
    #[serde(default)]
    pub cancel: bool,
}

/// A service without its storage id.
///
/// Drafts are upserted on `(provider_id, provider_service_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDraft {
    pub provider_id: String,
    pub provider_service_id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rate: Decimal,
    pub min: u32,
    pub max: u32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub refill: bool,
    #[serde(default)]
    pub cancel: bool,
}

impl ServiceDraft {
    pub fn into_service(self, id: i64) -> Service {
        Service {
            id,
            provider_id: self.provider_id,
            provider_service_id: self.provider_service_id,
            name: self.name,
            category: self.category,
            description: self.description,
            rate: self.rate,
            min: self.min,
            max: self.max,
            active: self.active,
            refill: self.refill,
            cancel: self.cancel,
        }
    }

    /// Checks the invariants every stored service must hold.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("service name must not be empty");
        }
        if self.provider_id.is_empty() || self.provider_service_id.is_empty() {
            return Err("provider reference must not be empty");
        }
        if self.rate.is_sign_negative() {
            return Err("rate must not be negative");
        }
        if self.min == 0 || self.min > self.max {
            return Err("min must be positive and not above max");
        }
        Ok(())
    }
}

impl Service {
    pub fn accepts_quantity(&self, quantity: u32) -> bool {
        quantity >= self.min && quantity <= self.max
    }
}
