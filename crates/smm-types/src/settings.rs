//! Storefront-wide settings editable by admins.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub site_name: String,
    /// ISO currency code balances are held in.
    pub currency: String,
    pub min_deposit: Decimal,
    #[serde(default)]
    pub manual_payment_instructions: String,
    #[serde(default)]
    pub support_email: Option<String>,
    #[serde(default)]
    pub announcement: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            site_name: "SMM Panel".to_string(),
            currency: "USD".to_string(),
            min_deposit: Decimal::ONE,
            manual_payment_instructions: String::new(),
            support_email: None,
            announcement: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.site_name.trim().is_empty() {
            return Err("site name must not be empty");
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err("currency must be a three-letter code");
        }
        if self.min_deposit <= Decimal::ZERO {
            return Err("minimum deposit must be positive");
        }
        Ok(())
    }
}

/// Settings as exposed to anonymous visitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicConfig {
    #[serde(flatten)]
    pub settings: Settings,
    pub crypto_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_currency_and_deposit() {
        let mut settings = Settings::default();
        settings.currency = "dollars".into();
        assert!(settings.validate().is_err());
        let mut settings = Settings::default();
        settings.min_deposit = Decimal::ZERO;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn public_config_is_flat() {
        let config = PublicConfig {
            settings: Settings::default(),
            crypto_enabled: true,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["site_name"], "SMM Panel");
        assert_eq!(json["crypto_enabled"], true);
    }
}
