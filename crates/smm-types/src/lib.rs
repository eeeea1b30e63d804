//! Core structures for the SMM panel.
//!
//! These are the rows the storefront stores and the values its HTTP API exchanges.
//! Every type serializes with snake_case field and variant names, matching the database
//! columns and the JSON the browser client consumes.
//!
//! # Modules
//!
//! - [`account`]: Profiles, roles and the balance ledger.
//! - [`catalog`]: Services resold from upstream providers.
//! - [`config`]: [`LiteralOrEnv`](config::LiteralOrEnv) for env-resolved configuration values.
//! - [`money`]: Human-entered amounts and the charge/refund arithmetic.
//! - [`order`]: Orders and their status lifecycle.
//! - [`page`]: Pagination windows.
//! - [`payment`]: Manual and crypto balance top-ups.
//! - [`settings`]: Storefront settings and the public config.
//! - [`ticket`]: Support tickets and messages.

pub mod account;
pub mod catalog;
pub mod config;
pub mod money;
pub mod order;
pub mod page;
pub mod payment;
pub mod settings;
pub mod ticket;
