//! Notification boundary.

use crate::error::Result;
use crate::store::BoxFuture;
use crate::ticket::Ticket;
use serde::{Deserialize, Serialize};

/// Why a notification is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A ticket was opened.
    Open,
    /// A ticket's status changed.
    Update,
}

impl EventKind {
    /// Short name for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Update => "update",
        }
    }
}

/// Sends notifications about ticket events.
///
/// Implementations attempt delivery and report the outcome; callers never let
/// an error from here abort an already committed write. Retries, if any, are
/// the implementation's business.
pub trait Notifier: Send + Sync {
    /// Deliver a notification about `ticket`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HelpdeskError::NotificationDelivery`] if delivery failed.
    fn notify<'a>(&'a self, ticket: &'a Ticket, kind: EventKind) -> BoxFuture<'a, Result<()>>;
}
