//! Tickets: the unit of support work.

use crate::error::{HelpdeskError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of every generated protocol.
pub const PROTOCOL_PREFIX: &str = "TICKET-";

/// Number of timestamp digits after the prefix (`%Y%m%d%H%M%S`).
pub const PROTOCOL_DIGITS: usize = 14;

/// Externally visible tracking code of a ticket.
///
/// The protocol is the only key customer-facing routes use to look a ticket
/// up; the internal numeric id never leaves the server. It is immutable
/// after creation and also identifies the ticket's chat room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Protocol(String);

impl Protocol {
    /// Wrap an existing protocol string (as received from a URL or the database).
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the protocol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the protocol has the generated shape
    /// `TICKET-` followed by exactly 14 digits.
    ///
    /// # Examples
    ///
    /// ```
    /// # use helpdesk_core::Protocol;
    /// assert!(Protocol::new("TICKET-20250314093000").is_well_formed());
    /// assert!(!Protocol::new("TICKET-2025").is_well_formed());
    /// ```
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0.strip_prefix(PROTOCOL_PREFIX).is_some_and(|digits| {
            digits.len() == PROTOCOL_DIGITS && digits.bytes().all(|b| b.is_ascii_digit())
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Protocol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Workflow label of a ticket.
///
/// This is a labeling workflow, not a strict DAG: any status may move to any
/// other. Only the initial status is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Initial status of every new ticket.
    AwaitingResponse,
    /// Staff is working on the ticket.
    InProgress,
    /// Staff is waiting for the customer to answer.
    WaitingOnCustomer,
    /// The issue has been solved.
    Resolved,
    /// The ticket is closed.
    Closed,
}

impl TicketStatus {
    /// Every status, in workflow order.
    pub const ALL: [Self; 5] = [
        Self::AwaitingResponse,
        Self::InProgress,
        Self::WaitingOnCustomer,
        Self::Resolved,
        Self::Closed,
    ];

    /// Stable storage / wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingResponse => "awaiting_response",
            Self::InProgress => "in_progress",
            Self::WaitingOnCustomer => "waiting_on_customer",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Human readable label, used in system messages and emails.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AwaitingResponse => "Awaiting Response",
            Self::InProgress => "In Progress",
            Self::WaitingOnCustomer => "Waiting on Customer",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::AwaitingResponse
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TicketStatus {
    type Err = HelpdeskError;

    /// Accepts the wire name (`in_progress`), the label (`In Progress`) or
    /// the variant name (`InProgress`), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|status| normalize(status.as_str()) == wanted)
            .ok_or_else(|| HelpdeskError::Validation(format!("unknown ticket status '{s}'")))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A persisted ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Internal id, never used by customer-facing routes.
    pub id: i64,
    /// Unique tracking code.
    pub protocol: Protocol,
    /// Customer display name.
    pub customer_name: String,
    /// Customer email (notification recipient).
    pub customer_email: String,
    /// Sector / category.
    pub sector: String,
    /// Customer role / function.
    pub role: String,
    /// Free-text problem description.
    pub description: String,
    /// Current workflow status.
    pub status: TicketStatus,
    /// Server time at creation.
    pub created_at: DateTime<Utc>,
    /// Optional opaque attachment reference.
    pub attachment: Option<String>,
}

/// Public submission form, as sent by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSubmission {
    /// Customer display name.
    #[serde(alias = "name")]
    pub customer_name: String,
    /// Customer email.
    #[serde(alias = "email")]
    pub customer_email: String,
    /// Sector / category.
    pub sector: String,
    /// Role / function.
    pub role: String,
    /// Problem description.
    pub description: String,
    /// Optional attachment reference (storage is handled elsewhere).
    #[serde(default)]
    pub attachment: Option<String>,
}

impl TicketSubmission {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Validation`] naming the first empty field, or
    /// if the email has no `@`.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("customer_name", &self.customer_name),
            ("customer_email", &self.customer_email),
            ("sector", &self.sector),
            ("role", &self.role),
            ("description", &self.description),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(HelpdeskError::Validation(format!("{name} is required")));
            }
        }

        if !self.customer_email.contains('@') {
            return Err(HelpdeskError::Validation(
                "customer_email is not a valid email address".to_string(),
            ));
        }

        Ok(())
    }

    /// Turn the (validated) submission into an insertable ticket.
    #[must_use]
    pub fn into_new_ticket(self, protocol: Protocol, created_at: DateTime<Utc>) -> NewTicket {
        NewTicket {
            protocol,
            customer_name: self.customer_name.trim().to_string(),
            customer_email: self.customer_email.trim().to_string(),
            sector: self.sector.trim().to_string(),
            role: self.role.trim().to_string(),
            description: self.description.trim().to_string(),
            status: TicketStatus::AwaitingResponse,
            created_at,
            attachment: self
                .attachment
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
        }
    }
}

/// A ticket about to be inserted (no id yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    /// Generated tracking code.
    pub protocol: Protocol,
    /// Customer display name.
    pub customer_name: String,
    /// Customer email.
    pub customer_email: String,
    /// Sector / category.
    pub sector: String,
    /// Role / function.
    pub role: String,
    /// Problem description.
    pub description: String,
    /// Initial status.
    pub status: TicketStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optional attachment reference.
    pub attachment: Option<String>,
}

impl NewTicket {
    /// Attach the id assigned by the store.
    #[must_use]
    pub fn with_id(self, id: i64) -> Ticket {
        Ticket {
            id,
            protocol: self.protocol,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            sector: self.sector,
            role: self.role,
            description: self.description,
            status: self.status,
            created_at: self.created_at,
            attachment: self.attachment,
        }
    }
}
