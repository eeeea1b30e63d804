//! Row storage.
//!
//! [`Store`] is the only way the rest of the server touches persistent state. Two backends
//! implement it:
//!
//! - [`SupabaseStore`] talks to Supabase PostgREST with the service-role key.
//! - [`MemoryStore`] keeps rows in process memory, for tests and local runs.
//!
//! Balance changes always go through [`Store::apply_balance_change`], which checks and
//! writes the new balance together with its ledger entry in one step.

mod memory;
mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use smm_types::account::{LedgerEntry, LedgerKind, NewProfile, Profile};
use smm_types::catalog::{Service, ServiceDraft};
use smm_types::order::{NewOrder, Order, OrderFilter, OrderStatus, OrderUpdate};
use smm_types::page::Page;
use smm_types::payment::{NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentStatus};
use smm_types::settings::Settings;
use smm_types::ticket::{
    NewTicket, NewTicketMessage, Ticket, TicketFilter, TicketMessage, TicketStatus, TicketThread,
};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("insufficient balance: {available} available")]
    InsufficientBalance { available: Decimal },
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// Creates a zero-balance `user` profile. Fails with `Conflict` if the id exists.
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError>;

    async fn list_profiles(&self, page: Page) -> Result<Vec<Profile>, StoreError>;

    /// Adds `delta` to the user's balance and records it in the ledger.
    ///
    /// Fails with `InsufficientBalance` if the balance would go negative and with
    /// `NotFound` if the profile does not exist. Nothing is written on failure.
    async fn apply_balance_change(
        &self,
        user_id: Uuid,
        delta: Decimal,
        kind: LedgerKind,
        reference: Option<String>,
    ) -> Result<LedgerEntry, StoreError>;

    async fn list_ledger(&self, user_id: Uuid, page: Page)
    -> Result<Vec<LedgerEntry>, StoreError>;

    async fn list_services(&self, active_only: bool) -> Result<Vec<Service>, StoreError>;

    async fn get_service(&self, id: i64) -> Result<Option<Service>, StoreError>;

    /// Inserts or replaces the service keyed by `(provider_id, provider_service_id)`.
    async fn upsert_service(&self, draft: ServiceDraft) -> Result<Service, StoreError>;

    async fn set_service_active(&self, id: i64, active: bool) -> Result<Service, StoreError>;

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError>;

    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order, StoreError>;

    /// Applies `update` only if the order is currently in `from`.
    ///
    /// Returns `None` when the order exists but has moved on. Refunds hang off a `Some`.
    async fn transition_order(
        &self,
        id: i64,
        from: OrderStatus,
        update: OrderUpdate,
    ) -> Result<Option<Order>, StoreError>;

    /// Newest first.
    async fn list_orders(&self, filter: &OrderFilter, page: Page)
    -> Result<Vec<Order>, StoreError>;

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;

    async fn get_payment(&self, id: i64) -> Result<Option<Payment>, StoreError>;

    async fn find_payment_by_reference(
        &self,
        method: PaymentMethod,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError>;

    /// Records the gateway invoice id and hosted URL on a payment.
    async fn attach_invoice(
        &self,
        id: i64,
        reference: &str,
        invoice_url: &str,
    ) -> Result<Payment, StoreError>;

    /// Moves a payment from `from` to `to`, only if it is currently in `from`.
    ///
    /// Returns `None` when the payment exists but is in another status.
    async fn transition_payment(
        &self,
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
        note: Option<String>,
    ) -> Result<Option<Payment>, StoreError>;

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: Page,
    ) -> Result<Vec<Payment>, StoreError>;

    /// Opens a ticket together with its first (customer) message.
    async fn insert_ticket(
        &self,
        ticket: NewTicket,
        first_message: String,
    ) -> Result<TicketThread, StoreError>;

    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError>;

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> Result<Vec<Ticket>, StoreError>;

    async fn insert_ticket_message(
        &self,
        message: NewTicketMessage,
    ) -> Result<TicketMessage, StoreError>;

    /// Oldest first.
    async fn list_ticket_messages(&self, ticket_id: i64)
    -> Result<Vec<TicketMessage>, StoreError>;

    async fn set_ticket_status(&self, id: i64, status: TicketStatus)
    -> Result<Ticket, StoreError>;

    /// Stored settings, or the defaults if none were saved yet.
    async fn get_settings(&self) -> Result<Settings, StoreError>;

    async fn put_settings(&self, settings: Settings) -> Result<Settings, StoreError>;
}
