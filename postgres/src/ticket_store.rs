//! `PostgreSQL` ticket store.

use crate::map_db_error;
use chrono::{DateTime, Utc};
use helpdesk_core::lifecycle::{EffectPlan, TicketCommand, TicketReducer};
use helpdesk_core::reducer::Reducer;
use helpdesk_core::store::{Applied, BoxFuture, TicketStore};
use helpdesk_core::{
    HelpdeskError, Message, MessageKind, NewMessage, NewTicket, Protocol, Result, Ticket,
    TicketStatus,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

const TICKET_COLUMNS: &str = "id, protocol, customer_name, customer_email, sector, role, \
                              description, status, created_at, attachment";

/// [`TicketStore`] backed by `PostgreSQL`.
///
/// Every write that depends on the current ticket runs in a transaction that
/// first takes the ticket's row lock, so writers to one ticket are serialized
/// while different tickets proceed in parallel.
#[derive(Clone, Debug)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_ticket(row: &PgRow) -> Result<Ticket> {
        let status: String = row.try_get("status").map_err(|e| map_db_error("Bad ticket row", e))?;
        Ok(Ticket {
            id: row.try_get("id").map_err(|e| map_db_error("Bad ticket row", e))?,
            protocol: Protocol::new(
                row.try_get::<String, _>("protocol")
                    .map_err(|e| map_db_error("Bad ticket row", e))?,
            ),
            customer_name: row.try_get("customer_name").map_err(|e| map_db_error("Bad ticket row", e))?,
            customer_email: row.try_get("customer_email").map_err(|e| map_db_error("Bad ticket row", e))?,
            sector: row.try_get("sector").map_err(|e| map_db_error("Bad ticket row", e))?,
            role: row.try_get("role").map_err(|e| map_db_error("Bad ticket row", e))?,
            description: row.try_get("description").map_err(|e| map_db_error("Bad ticket row", e))?,
            status: status
                .parse::<TicketStatus>()
                .map_err(|_| HelpdeskError::Database(format!("Unknown ticket status: {status}")))?,
            created_at: row.try_get("created_at").map_err(|e| map_db_error("Bad ticket row", e))?,
            attachment: row.try_get("attachment").map_err(|e| map_db_error("Bad ticket row", e))?,
        })
    }

    fn row_to_message(row: &PgRow) -> Result<Message> {
        let kind: String = row.try_get("kind").map_err(|e| map_db_error("Bad message row", e))?;
        Ok(Message {
            id: row.try_get("id").map_err(|e| map_db_error("Bad message row", e))?,
            ticket_protocol: Protocol::new(
                row.try_get::<String, _>("ticket_protocol")
                    .map_err(|e| map_db_error("Bad message row", e))?,
            ),
            author: row.try_get("author").map_err(|e| map_db_error("Bad message row", e))?,
            content: row.try_get("content").map_err(|e| map_db_error("Bad message row", e))?,
            sent_at: row.try_get("sent_at").map_err(|e| map_db_error("Bad message row", e))?,
            kind: MessageKind::parse(&kind)
                .ok_or_else(|| HelpdeskError::Database(format!("Unknown message kind: {kind}")))?,
        })
    }

    /// Lock the ticket row for the rest of the transaction.
    async fn lock_ticket(conn: &mut PgConnection, protocol: &Protocol) -> Result<Ticket> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE protocol = $1 FOR UPDATE"
        ))
        .bind(protocol.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_db_error("Failed to lock ticket", e))?
        .ok_or_else(|| HelpdeskError::ticket_not_found(protocol.as_str()))?;

        Self::row_to_ticket(&row)
    }

    /// Insert a message with `sent_at` clamped to the ticket's latest message.
    ///
    /// Callers must hold the ticket's row lock.
    async fn insert_message(conn: &mut PgConnection, message: NewMessage) -> Result<Message> {
        let row = sqlx::query(
            r"
            INSERT INTO messages (ticket_protocol, author, content, sent_at, kind)
            VALUES (
                $1, $2, $3,
                GREATEST($4::timestamptz, (SELECT MAX(sent_at) FROM messages WHERE ticket_protocol = $1)),
                $5
            )
            RETURNING id, sent_at
            ",
        )
        .bind(message.ticket_protocol.as_str())
        .bind(&message.author)
        .bind(&message.content)
        .bind(message.sent_at)
        .bind(message.kind.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_db_error("Failed to insert message", e))?;

        let id: i64 = row.try_get("id").map_err(|e| map_db_error("Bad message row", e))?;
        let sent_at: DateTime<Utc> = row.try_get("sent_at").map_err(|e| map_db_error("Bad message row", e))?;

        Ok(message.persisted(id, sent_at))
    }
}

impl TicketStore for PostgresTicketStore {
    fn insert_ticket(&self, ticket: NewTicket) -> BoxFuture<'_, Result<Ticket>> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO tickets (
                    protocol, customer_name, customer_email, sector, role,
                    description, status, created_at, attachment
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id
                ",
            )
            .bind(ticket.protocol.as_str())
            .bind(&ticket.customer_name)
            .bind(&ticket.customer_email)
            .bind(&ticket.sector)
            .bind(&ticket.role)
            .bind(&ticket.description)
            .bind(ticket.status.as_str())
            .bind(ticket.created_at)
            .bind(ticket.attachment.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to insert ticket", e))?;

            tracing::debug!(ticket_id = id, protocol = %ticket.protocol, "Ticket inserted");

            Ok(ticket.with_id(id))
        })
    }

    fn find_ticket<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Option<Ticket>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE protocol = $1"))
                .bind(protocol.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_db_error("Failed to load ticket", e))?;

            row.as_ref().map(Self::row_to_ticket).transpose()
        })
    }

    fn list_tickets(&self) -> BoxFuture<'_, Result<Vec<Ticket>>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to list tickets", e))?;

            rows.iter().map(Self::row_to_ticket).collect()
        })
    }

    fn apply<'a>(
        &'a self,
        protocol: &'a Protocol,
        command: TicketCommand,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Applied>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_db_error("Failed to begin transaction", e))?;

            let mut ticket = Self::lock_ticket(&mut *tx, protocol).await?;
            let plan: EffectPlan = TicketReducer.reduce(&mut ticket, command, &now).into_iter().collect();

            if plan.is_empty() {
                // Dropping the transaction releases the lock.
                return Ok(Applied {
                    ticket,
                    messages: Vec::new(),
                    notifications: plan.notifications,
                });
            }

            if let Some(status) = plan.status {
                sqlx::query("UPDATE tickets SET status = $1 WHERE protocol = $2")
                    .bind(status.as_str())
                    .bind(protocol.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_db_error("Failed to update status", e))?;
            }

            let mut messages = Vec::with_capacity(plan.messages.len());
            for message in plan.messages {
                messages.push(Self::insert_message(&mut *tx, message).await?);
            }

            tx.commit()
                .await
                .map_err(|e| map_db_error("Failed to commit transaction", e))?;

            tracing::debug!(
                protocol = %protocol,
                status = ticket.status.as_str(),
                messages = messages.len(),
                "Ticket command committed"
            );

            Ok(Applied {
                ticket,
                messages,
                notifications: plan.notifications,
            })
        })
    }

    fn append_message(&self, message: NewMessage) -> BoxFuture<'_, Result<Message>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_db_error("Failed to begin transaction", e))?;

            Self::lock_ticket(&mut *tx, &message.ticket_protocol).await?;
            let message = Self::insert_message(&mut *tx, message).await?;

            tx.commit()
                .await
                .map_err(|e| map_db_error("Failed to commit transaction", e))?;

            Ok(message)
        })
    }

    fn messages<'a>(&'a self, protocol: &'a Protocol) -> BoxFuture<'a, Result<Vec<Message>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, ticket_protocol, author, content, sent_at, kind
                FROM messages
                WHERE ticket_protocol = $1
                ORDER BY sent_at ASC, id ASC
                ",
            )
            .bind(protocol.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("Failed to load messages", e))?;

            rows.iter().map(Self::row_to_message).collect()
        })
    }
}
