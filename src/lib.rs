//! Backend for an SMM (social media marketing) reseller storefront.
//!
//! Customers hold a balance, top it up through manual transfers or crypto invoices, and
//! spend it on services resold from upstream provider panels. Orders are forwarded to the
//! provider and refunded when the provider refuses or only partially delivers them.
//!
//! # Modules
//!
//! - [`config`]: JSON configuration with `$ENV` references for secrets.
//! - [`store`]: the [`Store`](store::Store) trait with Supabase (PostgREST) and in-memory backends.
//! - [`auth`]: bearer-token verification and the user/admin extractors.
//! - [`identity`]: sign-up and sign-in through Supabase Auth.
//! - [`orders`], [`payments`], [`tickets`], [`catalog`]: the business rules, one desk each.
//! - [`handlers`]: the axum router.
//! - [`util`]: telemetry and signal handling.
//!
//! Shared row types live in `smm-types`; provider and crypto gateway clients in `smm-upstream`.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod orders;
pub mod payments;
pub mod public_config;
mod run;
pub mod state;
pub mod store;
pub mod tickets;
pub mod util;

pub use run::run;
