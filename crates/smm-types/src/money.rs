use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Number of decimal places kept for charges, refunds and marked-up rates.
pub const MONEY_SCALE: u32 = 4;

/// A non-negative amount of account currency entered by a human.
///
/// Accepts strings like `"$10"`, `"1,000.50"`, `"€20"`, or raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MoneyAmount(pub Decimal);

impl MoneyAmount {
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns the number of digits after the decimal point in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error(
        "Amount must be between {} and {}",
        money_amount::MIN_STR,
        money_amount::MAX_STR
    )]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    #[error("Too big of a precision: {0} decimal places, at most {MONEY_SCALE} allowed")]
    WrongPrecision(u32),
}

mod money_amount {
    use super::*;
    use once_cell::sync::Lazy;

    pub const MIN_STR: &str = "0.0001";
    pub const MAX_STR: &str = "1000000000";

    pub static MIN: Lazy<Decimal> =
        Lazy::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: Lazy<Decimal> =
        Lazy::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
    pub static NOISE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));
}

impl MoneyAmount {
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        // Remove anything that isn't digit, dot, minus
        let cleaned = money_amount::NOISE.replace_all(input, "").to_string();

        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;
        Self::try_from(parsed)
    }
}

impl TryFrom<Decimal> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyAmountParseError::Negative);
        }
        if value < *money_amount::MIN || value > *money_amount::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        let value = value.normalize();
        if value.scale() > MONEY_SCALE {
            return Err(MoneyAmountParseError::WrongPrecision(value.scale()));
        }
        Ok(MoneyAmount(value))
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl TryFrom<f64> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let decimal = Decimal::from_f64(value).ok_or(MoneyAmountParseError::OutOfRange)?;
        Self::try_from(decimal)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl serde::Serialize for MoneyAmount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MoneyAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Clients send either "12.50" or 12.5
        let value = serde_json::Value::deserialize(deserializer)?;
        let parsed = match &value {
            serde_json::Value::String(s) => MoneyAmount::parse(s),
            serde_json::Value::Number(n) => n
                .to_string()
                .parse::<Decimal>()
                .map_err(|_| MoneyAmountParseError::InvalidFormat)
                .and_then(MoneyAmount::try_from),
            _ => Err(MoneyAmountParseError::InvalidFormat),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

fn round_money(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Price of `quantity` units of a service priced per thousand.
pub fn order_charge(rate_per_thousand: Decimal, quantity: u32) -> Decimal {
    round_money(rate_per_thousand * Decimal::from(quantity) / Decimal::ONE_THOUSAND)
}

/// Portion of `charge` that corresponds to the `remains` units never delivered.
pub fn partial_refund(charge: Decimal, remains: u64, quantity: u32) -> Decimal {
    if quantity == 0 {
        return Decimal::ZERO;
    }
    let refund = round_money(charge * Decimal::from(remains) / Decimal::from(quantity));
    refund.clamp(Decimal::ZERO, charge)
}

/// Applies a reseller markup expressed in percent to an upstream rate.
pub fn with_markup(rate: Decimal, percent: Decimal) -> Decimal {
    round_money(rate * (Decimal::ONE + percent / Decimal::ONE_HUNDRED))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_human_input() {
        assert_eq!(MoneyAmount::parse("$10").unwrap().as_decimal(), dec("10"));
        assert_eq!(
            MoneyAmount::parse("1,000.50").unwrap().as_decimal(),
            dec("1000.5")
        );
        assert_eq!(MoneyAmount::parse("€0.25").unwrap().to_string(), "0.25");
    }

    #[test]
    fn rejects_bad_amounts() {
        assert_eq!(
            MoneyAmount::parse("-5"),
            Err(MoneyAmountParseError::Negative)
        );
        assert_eq!(
            MoneyAmount::parse("0"),
            Err(MoneyAmountParseError::OutOfRange)
        );
        assert_eq!(
            MoneyAmount::parse("abc"),
            Err(MoneyAmountParseError::InvalidFormat)
        );
        assert_eq!(
            MoneyAmount::parse("1.00001"),
            Err(MoneyAmountParseError::WrongPrecision(5))
        );
    }

    #[test]
    fn deserializes_from_string_or_number() {
        let from_str: MoneyAmount = serde_json::from_str("\"12.50\"").unwrap();
        let from_num: MoneyAmount = serde_json::from_str("12.5").unwrap();
        assert_eq!(from_str, from_num);
        assert!(serde_json::from_str::<MoneyAmount>("true").is_err());
    }

    #[test]
    fn charge_is_rate_per_thousand() {
        assert_eq!(order_charge(dec("1.20"), 1000), dec("1.2"));
        assert_eq!(order_charge(dec("1.20"), 250), dec("0.3"));
        // 0.333 * 7 / 1000 = 0.002331 -> 0.0023
        assert_eq!(order_charge(dec("0.333"), 7), dec("0.0023"));
        // 0.00005 rounds away from zero
        assert_eq!(order_charge(dec("0.05"), 1), dec("0.0001"));
    }

    #[test]
    fn partial_refund_is_proportional_and_clamped() {
        assert_eq!(partial_refund(dec("3"), 250, 1000), dec("0.75"));
        assert_eq!(partial_refund(dec("3"), 5000, 1000), dec("3"));
        assert_eq!(partial_refund(dec("3"), 0, 1000), Decimal::ZERO);
        assert_eq!(partial_refund(dec("3"), 10, 0), Decimal::ZERO);
    }

    #[test]
    fn markup_applies_percent() {
        assert_eq!(with_markup(dec("1.00"), dec("25")), dec("1.25"));
        assert_eq!(with_markup(dec("0.0333"), dec("10")), dec("0.0366"));
        assert_eq!(with_markup(dec("2"), Decimal::ZERO), dec("2"));
    }
}
