//! Support tickets between customers and staff.

use serde::Deserialize;
use smm_types::ticket::{
    MAX_MESSAGE_LEN, MAX_SUBJECT_LEN, NewTicket, NewTicketMessage, Ticket, TicketStatus,
    TicketThread, clean_text,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenTicket {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub order_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    pub message: String,
}

/// Who is acting on a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(Uuid),
    Staff(Uuid),
}

impl Actor {
    fn id(&self) -> Uuid {
        match self {
            Actor::Customer(id) | Actor::Staff(id) => *id,
        }
    }

    fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff(_))
    }
}

fn message_body(text: &str) -> Result<String, ApiError> {
    clean_text(text, MAX_MESSAGE_LEN)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::validation(format!("message must be 1 to {MAX_MESSAGE_LEN} characters"))
        })
}

pub struct TicketDesk {
    store: Arc<dyn Store>,
}

impl TicketDesk {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn open(&self, user_id: Uuid, request: OpenTicket) -> Result<TicketThread, ApiError> {
        let subject = clean_text(&request.subject, MAX_SUBJECT_LEN).ok_or_else(|| {
            ApiError::validation(format!("subject must be 1 to {MAX_SUBJECT_LEN} characters"))
        })?;
        let body = message_body(&request.message)?;
        if let Some(order_id) = request.order_id {
            let owned = self
                .store
                .get_order(order_id)
                .await?
                .is_some_and(|order| order.user_id == user_id);
            if !owned {
                return Err(ApiError::not_found("order"));
            }
        }
        let thread = self
            .store
            .insert_ticket(
                NewTicket {
                    user_id,
                    subject: subject.to_string(),
                    order_id: request.order_id,
                },
                body,
            )
            .await?;
        tracing::info!(ticket_id = thread.ticket.id, "Ticket opened");
        Ok(thread)
    }

    /// Ticket with its messages. Customers only see their own tickets.
    pub async fn thread(&self, actor: Actor, ticket_id: i64) -> Result<TicketThread, ApiError> {
        let ticket = self.visible_ticket(actor, ticket_id).await?;
        let messages = self.store.list_ticket_messages(ticket.id).await?;
        Ok(TicketThread { ticket, messages })
    }

    /// Adds a message. Customer replies reopen the ticket, staff replies mark it answered.
    #[instrument(skip_all, fields(ticket_id = ticket_id, staff = actor.is_staff()))]
    pub async fn reply(
        &self,
        actor: Actor,
        ticket_id: i64,
        reply: Reply,
    ) -> Result<TicketThread, ApiError> {
        let ticket = self.visible_ticket(actor, ticket_id).await?;
        let body = message_body(&reply.message)?;
        if ticket.status == TicketStatus::Closed && !actor.is_staff() {
            return Err(ApiError::Conflict("ticket is closed".to_string()));
        }
        self.store
            .insert_ticket_message(NewTicketMessage {
                ticket_id,
                author_id: actor.id(),
                staff: actor.is_staff(),
                body,
            })
            .await?;
        let status = if actor.is_staff() {
            TicketStatus::Answered
        } else {
            TicketStatus::Open
        };
        let ticket = self.store.set_ticket_status(ticket_id, status).await?;
        let messages = self.store.list_ticket_messages(ticket_id).await?;
        Ok(TicketThread { ticket, messages })
    }

    #[instrument(skip_all, fields(ticket_id = ticket_id))]
    pub async fn close(&self, actor: Actor, ticket_id: i64) -> Result<Ticket, ApiError> {
        let ticket = self.visible_ticket(actor, ticket_id).await?;
        if ticket.status == TicketStatus::Closed {
            return Ok(ticket);
        }
        let ticket = self
            .store
            .set_ticket_status(ticket_id, TicketStatus::Closed)
            .await?;
        tracing::info!("Ticket closed");
        Ok(ticket)
    }

    async fn visible_ticket(&self, actor: Actor, ticket_id: i64) -> Result<Ticket, ApiError> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .filter(|ticket| match actor {
                Actor::Staff(_) => true,
                Actor::Customer(id) => ticket.user_id == id,
            })
            .ok_or_else(|| ApiError::not_found("ticket"))
    }
}
