//! Deserializers for the loosely typed JSON upstream APIs return.

use serde::{Deserialize, Deserializer};

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Counts arrive as numbers, numeric strings, empty strings or null. Negative values
/// reported by some providers are clamped to zero.
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let count = match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(|n| n.max(0) as u64),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok().map(|n| n.max(0) as u64),
        _ => None,
    };
    Ok(count)
}

