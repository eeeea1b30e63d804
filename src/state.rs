//! Shared application state handed to every axum handler.

use rust_decimal::Decimal;
use smm_upstream::crypto::CallbackUrls;
use smm_upstream::{CryptoGateway, CryptoGatewayError, ProviderClient, ProviderRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::JwtVerifier;
use crate::catalog::CatalogDesk;
use crate::config::{Config, CryptoConfig, StoreConfig};
use crate::identity::{GoTrueClient, IdentityError, IdentityProvider};
use crate::orders::OrderDesk;
use crate::payments::{CryptoCheckout, PaymentDesk};
use crate::public_config::PublicConfigCache;
use crate::store::{MemoryStore, Store, StoreError, SupabaseStore};
use crate::tickets::TicketDesk;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("crypto gateway: {0}")]
    Crypto(#[from] CryptoGatewayError),
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub jwt: Arc<JwtVerifier>,
    pub orders: Arc<OrderDesk>,
    pub payments: Arc<PaymentDesk>,
    pub tickets: Arc<TicketDesk>,
    pub catalog: Arc<CatalogDesk>,
    pub public_config: Arc<PublicConfigCache>,
    pub admin_emails: Arc<Vec<String>>,
}

/// Already-built collaborators the state is assembled from.
pub struct Components {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub jwt_secret: String,
    pub providers: ProviderRegistry,
    pub markups: BTreeMap<String, Decimal>,
    pub crypto: Option<CryptoCheckout>,
    pub public_config_ttl: Duration,
    pub admin_emails: Vec<String>,
}

impl From<Components> for AppState {
    fn from(parts: Components) -> Self {
        let providers = Arc::new(parts.providers);
        let public_config = PublicConfigCache::new(parts.public_config_ttl, parts.crypto.is_some());
        AppState {
            orders: Arc::new(OrderDesk::new(parts.store.clone(), providers.clone())),
            payments: Arc::new(PaymentDesk::new(parts.store.clone(), parts.crypto)),
            tickets: Arc::new(TicketDesk::new(parts.store.clone())),
            catalog: Arc::new(CatalogDesk::new(
                parts.store.clone(),
                providers,
                parts.markups,
            )),
            store: parts.store,
            identity: parts.identity,
            jwt: Arc::new(JwtVerifier::new(&parts.jwt_secret)),
            public_config: Arc::new(public_config),
            admin_emails: Arc::new(parts.admin_emails),
        }
    }
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, StateError> {
        let store: Arc<dyn Store> = match config.store() {
            StoreConfig::Supabase { url, service_key } => {
                Arc::new(SupabaseStore::try_new(url, service_key.inner().clone())?)
            }
            StoreConfig::Memory => {
                tracing::warn!("Using the in-memory store, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let auth = config.auth();
        let identity = GoTrueClient::try_new(&auth.url, auth.anon_key.inner().clone())?;

        let mut clients = Vec::with_capacity(config.providers().len());
        let mut markups = BTreeMap::new();
        for (id, provider) in config.providers() {
            let client = ProviderClient::new(
                id.clone(),
                provider.api_url.inner().clone(),
                provider.api_key.inner().clone(),
            )
            .with_timeout(provider.timeout());
            clients.push(client);
            markups.insert(id.clone(), provider.markup_percent);
        }
        if clients.is_empty() {
            tracing::warn!("No providers configured, orders cannot be placed");
        }

        let crypto = config.crypto().map(crypto_checkout).transpose()?;
        if crypto.is_none() {
            tracing::info!("Crypto payments disabled");
        }

        Ok(Components {
            store,
            identity: Arc::new(identity),
            jwt_secret: auth.jwt_secret.inner().clone(),
            providers: ProviderRegistry::new(clients),
            markups,
            crypto,
            public_config_ttl: config.public_config_ttl(),
            admin_emails: auth.admin_emails.clone(),
        }
        .into())
    }
}

fn crypto_checkout(config: &CryptoConfig) -> Result<CryptoCheckout, CryptoGatewayError> {
    let callbacks = CallbackUrls {
        ipn_callback_url: config.callback_url.inner().clone(),
        success_url: config.success_url.as_ref().map(|u| u.inner().clone()),
        cancel_url: config.cancel_url.as_ref().map(|u| u.inner().clone()),
    };
    let gateway = CryptoGateway::try_new(
        &config.api_url,
        config.api_key.inner().clone(),
        config.ipn_secret.inner().clone(),
        callbacks,
    )?;
    Ok(CryptoCheckout {
        gateway,
        price_currency: config.price_currency.clone(),
    })
}
