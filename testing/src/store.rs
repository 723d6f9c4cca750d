//! In-memory providers.
//!
//! A single async mutex guards each store, so every operation is serialized.
//! That is stricter than the per-ticket serialization the trait requires.

use chrono::{DateTime, Utc};
use helpdesk_core::lifecycle::{EffectPlan, TicketCommand, TicketReducer};
use helpdesk_core::reducer::Reducer;
use helpdesk_core::store::{Applied, BoxFuture, TicketStore, UserRepository};
use helpdesk_core::{
    HelpdeskError, Message, NewMessage, NewTicket, NewUser, Protocol, Result, Ticket, User, UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    tickets: Vec<Ticket>,
    messages: Vec<Message>,
}

impl Tables {
    fn ticket_mut(&mut self, protocol: &Protocol) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|t| &t.protocol == protocol)
    }

    fn last_sent_at(&self, protocol: &Protocol) -> Option<DateTime<Utc>> {
        self.messages
            .iter()
            .filter(|m| &m.ticket_protocol == protocol)
            .map(|m| m.sent_at)
            .max()
    }

    fn push_message(&mut self, message: NewMessage) -> Message {
        let sent_at = self
            .last_sent_at(&message.ticket_protocol)
            .map_or(message.sent_at, |last| last.max(message.sent_at));
        let id = i64::try_from(self.messages.len()).unwrap_or(i64::MAX - 1) + 1;
        let message = message.persisted(id, sent_at);
        self.messages.push(message.clone());
        message
    }
}

/// In-memory [`TicketStore`].
///
/// Call [`fail_writes`](Self::fail_writes) to make every write fail with
/// [`HelpdeskError::Database`] without touching the stored data.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle write failure injection.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HelpdeskError::Database("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl TicketStore for InMemoryTicketStore {
    fn insert_ticket(&self, ticket: NewTicket) -> BoxFuture<'_, Result<Ticket>> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;
            self.check_writable()?;

            if tables.tickets.iter().any(|t| t.protocol == ticket.protocol) {
                return Err(HelpdeskError::Conflict(format!(
                    "ticket protocol {} already exists",
                    ticket.protocol
                )));
            }

            let id = i64::try_from(tables.tickets.len()).unwrap_or(i64::MAX - 1) + 1;
            let ticket = ticket.with_id(id);
            tables.tickets.push(ticket.clone());
            Ok(ticket)
        })
    }

    fn find_ticket<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Option<Ticket>>> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            Ok(tables.tickets.iter().find(|t| &t.protocol == protocol).cloned())
        })
    }

    fn list_tickets(&self) -> BoxFuture<'_, Result<Vec<Ticket>>> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            let mut tickets = tables.tickets.clone();
            tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(tickets)
        })
    }

    fn apply<'a>(
        &'a self,
        protocol: &'a Protocol,
        command: TicketCommand,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Applied>> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;

            let mut ticket = tables
                .ticket_mut(protocol)
                .cloned()
                .ok_or_else(|| HelpdeskError::ticket_not_found(protocol.as_str()))?;

            let plan: EffectPlan = TicketReducer.reduce(&mut ticket, command, &now).into_iter().collect();

            if plan.is_empty() {
                return Ok(Applied {
                    ticket,
                    messages: Vec::new(),
                    notifications: plan.notifications,
                });
            }

            self.check_writable()?;

            if let Some(stored) = tables.ticket_mut(protocol) {
                *stored = ticket.clone();
            }
            let messages = plan
                .messages
                .into_iter()
                .map(|message| tables.push_message(message))
                .collect();

            Ok(Applied {
                ticket,
                messages,
                notifications: plan.notifications,
            })
        })
    }

    fn append_message(&self, message: NewMessage) -> BoxFuture<'_, Result<Message>> {
        Box::pin(async move {
            let mut tables = self.tables.lock().await;

            if tables.ticket_mut(&message.ticket_protocol).is_none() {
                return Err(HelpdeskError::ticket_not_found(message.ticket_protocol.as_str()));
            }
            self.check_writable()?;

            Ok(tables.push_message(message))
        })
    }

    fn messages<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Vec<Message>>> {
        Box::pin(async move {
            let tables = self.tables.lock().await;
            let mut messages: Vec<Message> = tables
                .messages
                .iter()
                .filter(|m| &m.ticket_protocol == protocol)
                .cloned()
                .collect();
            messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then(a.id.cmp(&b.id)));
            Ok(messages)
        })
    }
}

/// In-memory [`UserRepository`].
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for InMemoryUserRepository {
    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User>> {
        Box::pin(async move {
            let mut users = self.users.lock().await;

            if users.iter().any(|u| u.email == user.email) {
                return Err(HelpdeskError::Conflict(format!(
                    "email {} is already registered",
                    user.email
                )));
            }

            let user = User {
                id: UserId::new(),
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                is_admin: user.is_admin,
                created_at: Utc::now(),
            };
            users.push(user.clone());
            Ok(user)
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<Option<User>>> {
        Box::pin(async move {
            let users = self.users.lock().await;
            Ok(users.iter().find(|u| u.email == email).cloned())
        })
    }

    fn find_by_id(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>>> {
        Box::pin(async move {
            let users = self.users.lock().await;
            Ok(users.iter().find(|u| u.id == id).cloned())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::fixtures;
    use chrono::Duration;
    use helpdesk_core::{MessageKind, TicketStatus};

    fn protocol() -> Protocol {
        Protocol::new("TICKET-20250101090000")
    }

    #[tokio::test]
    async fn test_duplicate_protocol_is_conflict() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(fixtures::new_ticket("TICKET-20250101090000")).await.unwrap();

        let err = store
            .insert_ticket(fixtures::new_ticket("TICKET-20250101090000"))
            .await
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = InMemoryTicketStore::new();
        let mut older = fixtures::new_ticket("TICKET-20250101090000");
        older.created_at -= Duration::hours(1);
        store.insert_ticket(older).await.unwrap();
        store.insert_ticket(fixtures::new_ticket("TICKET-20250101090001")).await.unwrap();

        let listed: Vec<_> = store
            .list_tickets()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.protocol.to_string())
            .collect();
        assert_eq!(listed, vec!["TICKET-20250101090001", "TICKET-20250101090000"]);
    }

    #[tokio::test]
    async fn test_sent_at_never_decreases() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(fixtures::new_ticket("TICKET-20250101090000")).await.unwrap();

        let now = Utc::now();
        let first = store
            .append_message(NewMessage::event(protocol(), "first", now))
            .await
            .unwrap();
        let second = store
            .append_message(NewMessage::event(protocol(), "second", now - Duration::seconds(30)))
            .await
            .unwrap();

        assert!(second.sent_at >= first.sent_at);
        let contents: Vec<_> = store
            .messages(&protocol())
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failed_apply_commits_nothing() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(fixtures::new_ticket("TICKET-20250101090000")).await.unwrap();
        store.fail_writes(true);

        let result = store
            .apply(
                &protocol(),
                TicketCommand::Update {
                    status: Some(TicketStatus::Closed),
                    comment: Some("closing".to_string()),
                    actor: fixtures::staff_actor(),
                },
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(HelpdeskError::Database(_))));

        store.fail_writes(false);
        let ticket = store.find_ticket(&protocol()).await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::AwaitingResponse);
        assert!(store.messages(&protocol()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_writes_status_and_message() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(fixtures::new_ticket("TICKET-20250101090000")).await.unwrap();

        let applied = store
            .apply(
                &protocol(),
                TicketCommand::ChangeStatus {
                    status: TicketStatus::Resolved,
                    actor: fixtures::staff_actor(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(applied.changed());
        assert_eq!(applied.messages[0].kind, MessageKind::StatusChange);
        let ticket = store.find_ticket(&protocol()).await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::Resolved);
    }

    #[tokio::test]
    async fn test_apply_on_missing_ticket_is_not_found() {
        let store = InMemoryTicketStore::new();
        let err = store
            .apply(
                &protocol(),
                TicketCommand::AddComment {
                    actor: fixtures::staff_actor(),
                    text: "hello".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let repo = InMemoryUserRepository::new();
        let user = NewUser {
            name: "Dana".to_string(),
            email: "dana@helpdesk.test".to_string(),
            password_hash: "hash".to_string(),
            is_admin: true,
        };
        repo.create_user(user.clone()).await.unwrap();

        assert!(matches!(repo.create_user(user).await, Err(HelpdeskError::Conflict(_))));
        assert!(repo.find_by_email("dana@helpdesk.test").await.unwrap().unwrap().is_admin);
    }
}
