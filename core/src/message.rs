//! Chat and system-log messages bound to one ticket.

use crate::ticket::Protocol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author label of server-generated events (joins and leaves).
pub const SYSTEM_AUTHOR: &str = "System";

/// What produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// An ordinary chat turn from a room member.
    Chat,
    /// An internal note left by staff.
    Comment,
    /// A join or leave event.
    Event,
    /// A record of a status transition.
    StatusChange,
}

impl MessageKind {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Comment => "comment",
            Self::Event => "event",
            Self::StatusChange => "status_change",
        }
    }

    /// Parse the storage name. Unknown names are rejected.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(Self::Chat),
            "comment" => Some(Self::Comment),
            "event" => Some(Self::Event),
            "status_change" => Some(Self::StatusChange),
            _ => None,
        }
    }

    /// Everything but an ordinary chat turn is server generated.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        !matches!(self, Self::Chat)
    }
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Insertion sequence number.
    pub id: i64,
    /// Parent ticket.
    pub ticket_protocol: Protocol,
    /// Free-text author label.
    pub author: String,
    /// Message body.
    pub content: String,
    /// Server timestamp, non-decreasing per ticket.
    pub sent_at: DateTime<Utc>,
    /// Origin of the message.
    pub kind: MessageKind,
}

impl Message {
    /// See [`MessageKind::is_system`].
    #[must_use]
    pub const fn is_system(&self) -> bool {
        self.kind.is_system()
    }
}

/// A message about to be appended.
///
/// `sent_at` is the caller's clock reading; the store may move it forward so
/// that timestamps never decrease within a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Parent ticket.
    pub ticket_protocol: Protocol,
    /// Free-text author label.
    pub author: String,
    /// Message body.
    pub content: String,
    /// Proposed timestamp.
    pub sent_at: DateTime<Utc>,
    /// Origin of the message.
    pub kind: MessageKind,
}

impl NewMessage {
    /// A join/leave event authored by [`SYSTEM_AUTHOR`].
    #[must_use]
    pub fn event(ticket_protocol: Protocol, content: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            ticket_protocol,
            author: SYSTEM_AUTHOR.to_string(),
            content: content.into(),
            sent_at,
            kind: MessageKind::Event,
        }
    }

    /// Attach id and final timestamp assigned by the store.
    #[must_use]
    pub fn persisted(self, id: i64, sent_at: DateTime<Utc>) -> Message {
        Message {
            id,
            ticket_protocol: self.ticket_protocol,
            author: self.author,
            content: self.content,
            sent_at,
            kind: self.kind,
        }
    }
}
