//! Support tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_SUBJECT_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Waiting for staff.
    Open,
    /// Waiting for the customer.
    Answered,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub user_id: Uuid,
    pub subject: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: i64,
    pub ticket_id: i64,
    pub author_id: Uuid,
    pub staff: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub user_id: Uuid,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicketMessage {
    pub ticket_id: i64,
    pub author_id: Uuid,
    pub staff: bool,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TicketFilter {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<TicketStatus>,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.user_id.is_none_or(|id| ticket.user_id == id)
            && self.status.is_none_or(|s| ticket.status == s)
    }
}

/// A ticket together with its conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketThread {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

/// Trims `text` and checks it is non-empty and at most `max` characters.
pub fn clean_text(text: &str, max: usize) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max {
        None
    } else {
        Some(trimmed)
    }
}
