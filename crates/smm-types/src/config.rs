//! Configuration value helpers.
//!
//! The [`LiteralOrEnv`] wrapper lets a configuration value be written either as a literal
//! or as a reference to an environment variable:
//!
//! ```json
//! {
//!   "url": "https://abc.supabase.co",     // Literal value
//!   "service_key": "$SUPABASE_SERVICE_KEY", // Simple env var
//!   "jwt_secret": "${SUPABASE_JWT_SECRET}"  // Braced env var
//! }
//! ```
//!
//! Secrets stay out of the config file and are resolved when the file is loaded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// The wrapper implements `Deref` to provide transparent access to the inner type.
#[derive(Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if the string matches `$VAR` or `${VAR}` syntax.
    fn parse_env_var_syntax(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            return Some(braced);
        }
        let var_name = s.strip_prefix('$')?;
        if !var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            Some(var_name)
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Values are frequently secrets, keep them out of debug logs.
impl<T> fmt::Debug for LiteralOrEnv<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LiteralOrEnv(..)")
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = match Self::parse_env_var_syntax(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?,
            None => s,
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;

        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}
