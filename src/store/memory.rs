use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use smm_types::account::{LedgerEntry, LedgerKind, NewProfile, Profile, Role};
use smm_types::catalog::{Service, ServiceDraft};
use smm_types::order::{NewOrder, Order, OrderFilter, OrderStatus, OrderUpdate};
use smm_types::page::Page;
use smm_types::payment::{NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentStatus};
use smm_types::settings::Settings;
use smm_types::ticket::{
    NewTicket, NewTicketMessage, Ticket, TicketFilter, TicketMessage, TicketStatus, TicketThread,
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    profiles: BTreeMap<Uuid, Profile>,
    ledger: Vec<LedgerEntry>,
    services: BTreeMap<i64, Service>,
    orders: BTreeMap<i64, Order>,
    payments: BTreeMap<i64, Payment>,
    tickets: BTreeMap<i64, Ticket>,
    ticket_messages: Vec<TicketMessage>,
    settings: Option<Settings>,
}

impl Tables {
    /// Ids are shared across tables, which keeps them unique and increasing.
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Process-local [`Store`]. Every operation takes the single table lock, so each call is
/// atomic with respect to the others.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.profiles.contains_key(&profile.id) {
            return Err(StoreError::Conflict("profile already exists".to_string()));
        }
        let row = Profile {
            id: profile.id,
            email: profile.email,
            username: profile.username,
            balance: Decimal::ZERO,
            role: Role::User,
            created_at: Utc::now(),
        };
        tables.profiles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_profiles(&self, page: Page) -> Result<Vec<Profile>, StoreError> {
        let tables = self.tables.read().await;
        let mut profiles: Vec<_> = tables.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.slice(profiles))
    }

    async fn apply_balance_change(
        &self,
        user_id: Uuid,
        delta: Decimal,
        kind: LedgerKind,
        reference: Option<String>,
    ) -> Result<LedgerEntry, StoreError> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .get(&user_id)
            .ok_or(StoreError::NotFound("profile"))?;
        let balance_after = profile.balance + delta;
        if balance_after < Decimal::ZERO {
            return Err(StoreError::InsufficientBalance {
                available: profile.balance,
            });
        }
        let id = tables.next_id();
        if let Some(profile) = tables.profiles.get_mut(&user_id) {
            profile.balance = balance_after;
        }
        let entry = LedgerEntry {
            id,
            user_id,
            amount: delta,
            kind,
            reference,
            balance_after,
            created_at: Utc::now(),
        };
        tables.ledger.push(entry.clone());
        Ok(entry)
    }

    async fn list_ledger(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.tables.read().await;
        let entries = tables
            .ledger
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned();
        Ok(page.slice(entries))
    }

    async fn list_services(&self, active_only: bool) -> Result<Vec<Service>, StoreError> {
        let tables = self.tables.read().await;
        let mut services: Vec<_> = tables
            .services
            .values()
            .filter(|s| !active_only || s.active)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.category.cmp(&b.category).then(a.id.cmp(&b.id)));
        Ok(services)
    }

    async fn get_service(&self, id: i64) -> Result<Option<Service>, StoreError> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }

    async fn upsert_service(&self, draft: ServiceDraft) -> Result<Service, StoreError> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .services
            .values()
            .find(|s| {
                s.provider_id == draft.provider_id
                    && s.provider_service_id == draft.provider_service_id
            })
            .map(|s| s.id);
        let id = match existing {
            Some(id) => id,
            None => tables.next_id(),
        };
        let service = draft.into_service(id);
        tables.services.insert(id, service.clone());
        Ok(service)
    }

    async fn set_service_active(&self, id: i64, active: bool) -> Result<Service, StoreError> {
        let mut tables = self.tables.write().await;
        let service = tables
            .services
            .get_mut(&id)
            .ok_or(StoreError::NotFound("service"))?;
        service.active = active;
        Ok(service.clone())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = Utc::now();
        let row = Order {
            id,
            user_id: order.user_id,
            service_id: order.service_id,
            link: order.link,
            quantity: order.quantity,
            charge: order.charge,
            status: order.status,
            provider_order_id: None,
            start_count: None,
            remains: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(id, row.clone());
        Ok(row)
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn update_order(&self, id: i64, update: OrderUpdate) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound("order"))?;
        update.apply_to(order);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn transition_order(
        &self,
        id: i64,
        from: OrderStatus,
        update: OrderUpdate,
    ) -> Result<Option<Order>, StoreError> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound("order"))?;
        if order.status != from {
            return Ok(None);
        }
        update.apply_to(order);
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        let orders = tables
            .orders
            .values()
            .rev()
            .filter(|o| filter.matches(o))
            .cloned();
        Ok(page.slice(orders))
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(reference) = payment.reference.as_deref() {
            let taken = tables
                .payments
                .values()
                .any(|p| p.method == payment.method && p.reference.as_deref() == Some(reference));
            if taken {
                return Err(StoreError::Conflict(
                    "payment reference already used".to_string(),
                ));
            }
        }
        let id = tables.next_id();
        let now = Utc::now();
        let row = Payment {
            id,
            user_id: payment.user_id,
            method: payment.method,
            amount: payment.amount,
            currency: payment.currency,
            status: PaymentStatus::Pending,
            reference: payment.reference,
            invoice_url: None,
            note: payment.note,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(id, row.clone());
        Ok(row)
    }

    async fn get_payment(&self, id: i64) -> Result<Option<Payment>, StoreError> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn find_payment_by_reference(
        &self,
        method: PaymentMethod,
        reference: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.method == method && p.reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn attach_invoice(
        &self,
        id: i64,
        reference: &str,
        invoice_url: &str,
    ) -> Result<Payment, StoreError> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .get_mut(&id)
            .ok_or(StoreError::NotFound("payment"))?;
        payment.reference = Some(reference.to_string());
        payment.invoice_url = Some(invoice_url.to_string());
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn transition_payment(
        &self,
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
        note: Option<String>,
    ) -> Result<Option<Payment>, StoreError> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .get_mut(&id)
            .ok_or(StoreError::NotFound("payment"))?;
        if payment.status != from {
            return Ok(None);
        }
        payment.status = to;
        if note.is_some() {
            payment.note = note;
        }
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: Page,
    ) -> Result<Vec<Payment>, StoreError> {
        let tables = self.tables.read().await;
        let payments = tables
            .payments
            .values()
            .rev()
            .filter(|p| filter.matches(p))
            .cloned();
        Ok(page.slice(payments))
    }

    async fn insert_ticket(
        &self,
        ticket: NewTicket,
        first_message: String,
    ) -> Result<TicketThread, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let ticket_id = tables.next_id();
        let message_id = tables.next_id();
        let row = Ticket {
            id: ticket_id,
            user_id: ticket.user_id,
            subject: ticket.subject,
            status: TicketStatus::Open,
            order_id: ticket.order_id,
            created_at: now,
            updated_at: now,
        };
        let message = TicketMessage {
            id: message_id,
            ticket_id,
            author_id: ticket.user_id,
            staff: false,
            body: first_message,
            created_at: now,
        };
        tables.tickets.insert(ticket_id, row.clone());
        tables.ticket_messages.push(message.clone());
        Ok(TicketThread {
            ticket: row,
            messages: vec![message],
        })
    }

    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tables.read().await.tickets.get(&id).cloned())
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
        page: Page,
    ) -> Result<Vec<Ticket>, StoreError> {
        let tables = self.tables.read().await;
        let mut tickets: Vec<_> = tables
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(page.slice(tickets))
    }

    async fn insert_ticket_message(
        &self,
        message: NewTicketMessage,
    ) -> Result<TicketMessage, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tickets.contains_key(&message.ticket_id) {
            return Err(StoreError::NotFound("ticket"));
        }
        let id = tables.next_id();
        let row = TicketMessage {
            id,
            ticket_id: message.ticket_id,
            author_id: message.author_id,
            staff: message.staff,
            body: message.body,
            created_at: Utc::now(),
        };
        tables.ticket_messages.push(row.clone());
        Ok(row)
    }

    async fn list_ticket_messages(
        &self,
        ticket_id: i64,
    ) -> Result<Vec<TicketMessage>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .ticket_messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn set_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
    ) -> Result<Ticket, StoreError> {
        let mut tables = self.tables.write().await;
        let ticket = tables
            .tickets
            .get_mut(&id)
            .ok_or(StoreError::NotFound("ticket"))?;
        ticket.status = status;
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    async fn get_settings(&self) -> Result<Settings, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .settings
            .clone()
            .unwrap_or_default())
    }

    async fn put_settings(&self, settings: Settings) -> Result<Settings, StoreError> {
        self.tables.write().await.settings = Some(settings.clone());
        Ok(settings)
    }
}
