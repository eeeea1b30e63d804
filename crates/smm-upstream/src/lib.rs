//! HTTP clients for the third parties an SMM storefront depends on.
//!
//! - [`provider`]: [`ProviderClient`](provider::ProviderClient) for upstream SMM panels
//!   speaking the common API v2 dialect, and a [`ProviderRegistry`](provider::ProviderRegistry)
//!   keyed by provider id.
//! - [`crypto`]: [`CryptoGateway`](crypto::CryptoGateway) for hosted crypto invoices and
//!   signed payment notifications.
//!
//! Both clients use `reqwest`, report failures through `thiserror` enums carrying the
//! request context, and log through `tracing`.

pub mod crypto;
mod de;
pub mod provider;

pub use crypto::{CryptoGateway, CryptoGatewayError};
pub use provider::{ProviderClient, ProviderClientError, ProviderRegistry};
