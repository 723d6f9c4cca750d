//! Persistence traits.
//!
//! Both traits return boxed futures instead of using `async fn` so they can be
//! used as trait objects (`Arc<dyn TicketStore>`).

use crate::error::Result;
use crate::lifecycle::TicketCommand;
use crate::message::{Message, NewMessage};
use crate::notifier::EventKind;
use crate::ticket::{NewTicket, Protocol, Ticket};
use crate::user::{NewUser, User, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed, `Send` future returned by the provider traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a transactional [`TicketStore::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// The ticket as committed.
    pub ticket: Ticket,
    /// Messages written by this transaction, in insertion order.
    pub messages: Vec<Message>,
    /// Notifications to dispatch now that the transaction has committed.
    pub notifications: Vec<EventKind>,
}

impl Applied {
    /// Returns `true` if the transaction wrote anything.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.messages.is_empty()
    }
}

/// Durable storage of tickets and their messages.
///
/// # Consistency
///
/// - A read issued after a write has returned observes that write.
/// - [`apply`](Self::apply) is atomic and serialized per ticket.
/// - Messages of a ticket are returned ordered by `(sent_at, id)` and
///   `sent_at` never decreases within a ticket.
pub trait TicketStore: Send + Sync {
    /// Insert a new ticket.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Conflict`](crate::HelpdeskError::Conflict) if the protocol is taken
    /// - [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure
    fn insert_ticket(&self, ticket: NewTicket) -> BoxFuture<'_, Result<Ticket>>;

    /// Look a ticket up by protocol.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure.
    fn find_ticket<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Option<Ticket>>>;

    /// All tickets, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure.
    fn list_tickets(&self) -> BoxFuture<'_, Result<Vec<Ticket>>>;

    /// Run `command` through the ticket state machine while holding the
    /// ticket's lock, and commit every resulting write in one transaction.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::NotFound`](crate::HelpdeskError::NotFound) if the ticket does not exist
    /// - [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure (nothing is committed)
    fn apply<'a>(
        &'a self,
        protocol: &'a Protocol,
        command: TicketCommand,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Applied>>;

    /// Append a single message to a ticket's log.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::NotFound`](crate::HelpdeskError::NotFound) if the ticket does not exist
    /// - [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure
    fn append_message(&self, message: NewMessage) -> BoxFuture<'_, Result<Message>>;

    /// A ticket's messages in display order.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure.
    fn messages<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Vec<Message>>>;
}

/// Storage of staff accounts.
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Conflict`](crate::HelpdeskError::Conflict) if the email is taken
    /// - [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure
    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User>>;

    /// Look a user up by email.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure.
    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<Option<User>>>;

    /// Look a user up by id.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`](crate::HelpdeskError::Database) on storage failure.
    fn find_by_id(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>>>;
}
