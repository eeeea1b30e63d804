//! Configuration for the SMM panel server.
//!
//! The server reads a JSON file (`--config`, `$CONFIG`, default `config.json`). Secret-bearing
//! fields accept `$VAR` / `${VAR}` references through [`LiteralOrEnv`], so the file itself can
//! be committed without credentials.
//!
//! ```json
//! {
//!   "port": 8080,
//!   "store": { "kind": "supabase", "url": "$SUPABASE_URL", "service_key": "$SUPABASE_SERVICE_KEY" },
//!   "auth": {
//!     "url": "$SUPABASE_URL",
//!     "anon_key": "$SUPABASE_ANON_KEY",
//!     "jwt_secret": "$SUPABASE_JWT_SECRET",
//!     "admin_emails": ["owner@example.com"]
//!   },
//!   "providers": {
//!     "main": { "api_url": "https://provider.example/api/v2", "api_key": "$MAIN_PROVIDER_KEY", "markup_percent": 25 }
//!   }
//! }
//! ```

use clap::Parser;
use rust_decimal::Decimal;
use serde::Deserialize;
use smm_types::config::LiteralOrEnv;
use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// CLI arguments for the SMM panel server.
#[derive(Parser, Debug)]
#[command(name = "smm-panel")]
#[command(about = "SMM reseller storefront HTTP server")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// Server configuration.
///
/// `host` and `port` fall back to `$HOST` / `$PORT`, then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    #[serde(default)]
    store: StoreConfig,
    auth: AuthConfig,
    #[serde(default)]
    providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    crypto: Option<CryptoConfig>,
    #[serde(default = "config_defaults::default_public_config_ttl_secs")]
    public_config_ttl_secs: u64,
    #[serde(default)]
    cors_origins: Vec<String>,
}

/// Where rows live.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Supabase PostgREST, authenticated with the service-role key.
    Supabase {
        url: LiteralOrEnv<Url>,
        service_key: LiteralOrEnv<String>,
    },
    /// Process-local rows, lost on restart.
    #[default]
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Supabase project URL; GoTrue lives under `/auth/v1`.
    pub url: LiteralOrEnv<Url>,
    pub anon_key: LiteralOrEnv<String>,
    /// HS256 secret access tokens are signed with.
    pub jwt_secret: LiteralOrEnv<String>,
    /// Accounts treated as admins regardless of their profile role.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub api_url: LiteralOrEnv<Url>,
    pub api_key: LiteralOrEnv<String>,
    /// Added on top of upstream rates when importing the provider catalog.
    #[serde(default)]
    pub markup_percent: Decimal,
    #[serde(default = "config_defaults::default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    pub api_url: LiteralOrEnv<Url>,
    pub api_key: LiteralOrEnv<String>,
    pub ipn_secret: LiteralOrEnv<String>,
    /// Public URL of `POST /payments/crypto/callback`.
    pub callback_url: LiteralOrEnv<Url>,
    #[serde(default)]
    pub success_url: Option<LiteralOrEnv<Url>>,
    #[serde(default)]
    pub cancel_url: Option<LiteralOrEnv<Url>>,
    #[serde(default = "config_defaults::default_price_currency")]
    pub price_currency: String,
}

pub mod config_defaults {
    use std::env;
    use std::net::IpAddr;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: &str = "0.0.0.0";
    pub const DEFAULT_PUBLIC_CONFIG_TTL_SECS: u64 = 60;
    pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

    /// Returns the default port value with fallback: $PORT env var -> 8080
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Returns the default host value with fallback: $HOST env var -> "0.0.0.0"
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| IpAddr::from([0, 0, 0, 0]))
    }

    pub fn default_public_config_ttl_secs() -> u64 {
        DEFAULT_PUBLIC_CONFIG_TTL_SECS
    }

    pub fn default_provider_timeout_secs() -> u64 {
        DEFAULT_PROVIDER_TIMEOUT_SECS
    }

    pub fn default_price_currency() -> String {
        "usd".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn providers(&self) -> &BTreeMap<String, ProviderConfig> {
        &self.providers
    }

    pub fn crypto(&self) -> Option<&CryptoConfig> {
        self.crypto.as_ref()
    }

    pub fn public_config_ttl(&self) -> Duration {
        Duration::from_secs(self.public_config_ttl_secs)
    }

    /// Allowed CORS origins. Empty means any origin.
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    /// Load configuration from CLI arguments and JSON file.
    ///
    /// The config file path is determined by:
    /// 1. `--config <path>` CLI argument
    /// 2. `$CONFIG` environment variable
    /// 3. `./config.json`
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        let config_path = Path::new(&cli_args.config)
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(cli_args.config, e))?;
        Self::load_from_path(config_path)
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }
}
