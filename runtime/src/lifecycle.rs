//! Ticket Lifecycle Manager.
//!
//! Opens tickets and drives their status transitions. Writes go through
//! [`TicketStore::apply`], which runs the pure ticket reducer under the
//! ticket's lock. The write runs under the ticket's chat room lock and the
//! new messages reach the room before any later chat message does; once the
//! write has committed the manager dispatches the resulting notifications.

use crate::chat::ChatCoordinator;
use crate::metrics::TicketMetrics;
use crate::notify::NotificationDispatcher;
use crate::protocol::ProtocolGenerator;
use helpdesk_core::environment::Clock;
use helpdesk_core::lifecycle::TicketCommand;
use helpdesk_core::store::{Applied, TicketStore};
use helpdesk_core::{
    Actor, Authorizer, EventKind, HelpdeskError, Message, MessageKind, Permission, Protocol,
    Result, Ticket, TicketStatus, TicketSubmission,
};
use serde::Serialize;
use std::sync::Arc;

/// How many protocols `open_ticket` tries before giving up.
pub const MAX_PROTOCOL_ATTEMPTS: usize = 5;

/// Result of a combined status + comment update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketUpdateOutcome {
    /// The ticket as committed.
    pub ticket: Ticket,
    /// Messages written by the update, in order.
    pub messages: Vec<Message>,
}

/// Owns ticket creation and every status transition.
pub struct LifecycleManager {
    store: Arc<dyn TicketStore>,
    authorizer: Arc<dyn Authorizer>,
    notifications: NotificationDispatcher,
    chat: Arc<ChatCoordinator>,
    protocols: ProtocolGenerator,
    clock: Arc<dyn Clock>,
}

impl LifecycleManager {
    /// Wire the manager to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        authorizer: Arc<dyn Authorizer>,
        notifications: NotificationDispatcher,
        chat: Arc<ChatCoordinator>,
        protocols: ProtocolGenerator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            authorizer,
            notifications,
            chat,
            protocols,
            clock,
        }
    }

    /// Continue protocol numbering after the newest stored ticket.
    ///
    /// Call once at startup, before serving, so a restart right after a burst
    /// of tickets does not reissue their protocols.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`] if the tickets cannot be listed.
    pub async fn resume_protocols(&self) -> Result<()> {
        let tickets = self.store.list_tickets().await?;
        if let Some(newest) = tickets.iter().map(|t| &t.protocol).max() {
            self.protocols.resume_after(newest);
            tracing::info!(protocol = %newest, "Resuming protocols after newest ticket");
        }
        Ok(())
    }

    /// Open a ticket from the public form.
    ///
    /// The ticket starts `AwaitingResponse`. An opening notification is
    /// dispatched after the insert; its outcome never affects the result.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Validation`] if a field is missing
    /// - [`HelpdeskError::Conflict`] if no free protocol was found in [`MAX_PROTOCOL_ATTEMPTS`] tries
    /// - [`HelpdeskError::Database`] on storage failure
    #[tracing::instrument(skip_all, fields(sector = %submission.sector))]
    pub async fn open_ticket(&self, submission: TicketSubmission) -> Result<Ticket> {
        submission.validate()?;

        let mut attempt = 1;
        let ticket = loop {
            let protocol = self.protocols.next();
            let new_ticket = submission
                .clone()
                .into_new_ticket(protocol.clone(), self.clock.now());

            match self.store.insert_ticket(new_ticket).await {
                Ok(ticket) => break ticket,
                Err(HelpdeskError::Conflict(reason)) if attempt < MAX_PROTOCOL_ATTEMPTS => {
                    tracing::warn!(%protocol, attempt, %reason, "Protocol taken, generating another");
                    attempt += 1;
                },
                Err(error) => return Err(error),
            }
        };

        TicketMetrics::record_opened();
        tracing::info!(protocol = %ticket.protocol, "Ticket opened");
        self.notifications.dispatch(ticket.clone(), EventKind::Open);

        Ok(ticket)
    }

    /// Move a ticket to `status`.
    ///
    /// Moving to the current status changes nothing and notifies no one.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Unauthorized`] if the actor may not mutate tickets
    /// - [`HelpdeskError::NotFound`] if the ticket does not exist
    /// - [`HelpdeskError::Database`] on storage failure (nothing is committed)
    #[tracing::instrument(skip_all, fields(protocol = %protocol, status = status.as_str(), actor = %actor.name))]
    pub async fn change_status(
        &self,
        protocol: &Protocol,
        status: TicketStatus,
        actor: Actor,
    ) -> Result<Ticket> {
        self.authorize(&actor)?;
        let applied = self
            .apply(protocol, TicketCommand::ChangeStatus { status, actor })
            .await?;
        Ok(applied.ticket)
    }

    /// Leave an internal note on a ticket. Never notifies.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Unauthorized`] if the actor may not mutate tickets
    /// - [`HelpdeskError::Validation`] if the text is blank
    /// - [`HelpdeskError::NotFound`] if the ticket does not exist
    /// - [`HelpdeskError::Database`] on storage failure
    #[tracing::instrument(skip_all, fields(protocol = %protocol, actor = %actor.name))]
    pub async fn add_comment(&self, protocol: &Protocol, actor: Actor, text: &str) -> Result<Message> {
        self.authorize(&actor)?;
        if text.trim().is_empty() {
            return Err(HelpdeskError::Validation("comment text is required".to_string()));
        }

        let applied = self
            .apply(
                protocol,
                TicketCommand::AddComment {
                    actor,
                    text: text.to_string(),
                },
            )
            .await?;

        applied
            .messages
            .into_iter()
            .next()
            .ok_or_else(|| HelpdeskError::Internal("comment was not recorded".to_string()))
    }

    /// Apply a status change and a comment together, status first.
    ///
    /// Both land in one transaction or neither does.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::Unauthorized`] if the actor may not mutate tickets
    /// - [`HelpdeskError::Validation`] if neither a status nor a comment is given
    /// - [`HelpdeskError::NotFound`] if the ticket does not exist
    /// - [`HelpdeskError::Database`] on storage failure (nothing is committed)
    #[tracing::instrument(skip_all, fields(protocol = %protocol, actor = %actor.name))]
    pub async fn update(
        &self,
        protocol: &Protocol,
        status: Option<TicketStatus>,
        comment: Option<String>,
        actor: Actor,
    ) -> Result<TicketUpdateOutcome> {
        self.authorize(&actor)?;

        let comment = comment.filter(|c| !c.trim().is_empty());
        if status.is_none() && comment.is_none() {
            return Err(HelpdeskError::Validation(
                "a status or a comment is required".to_string(),
            ));
        }

        let applied = self
            .apply(
                protocol,
                TicketCommand::Update {
                    status,
                    comment,
                    actor,
                },
            )
            .await?;

        Ok(TicketUpdateOutcome {
            ticket: applied.ticket,
            messages: applied.messages,
        })
    }

    /// Look a ticket up by protocol.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::NotFound`] if the ticket does not exist
    /// - [`HelpdeskError::Database`] on storage failure
    pub async fn ticket(&self, protocol: &Protocol) -> Result<Ticket> {
        self.store
            .find_ticket(protocol)
            .await?
            .ok_or_else(|| HelpdeskError::ticket_not_found(protocol.as_str()))
    }

    /// Every ticket, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::Database`] on storage failure.
    pub async fn dashboard(&self) -> Result<Vec<Ticket>> {
        self.store.list_tickets().await
    }

    /// A ticket's full log in display order.
    ///
    /// # Errors
    ///
    /// - [`HelpdeskError::NotFound`] if the ticket does not exist
    /// - [`HelpdeskError::Database`] on storage failure
    pub async fn history(&self, protocol: &Protocol) -> Result<Vec<Message>> {
        self.ticket(protocol).await?;
        self.store.messages(protocol).await
    }

    fn authorize(&self, actor: &Actor) -> Result<()> {
        if self.authorizer.authorize(actor, Permission::MutateTicket) {
            Ok(())
        } else {
            tracing::warn!(actor = %actor.name, "Ticket mutation denied");
            Err(HelpdeskError::Unauthorized(format!(
                "{} may not modify tickets",
                actor.name
            )))
        }
    }

    async fn apply(&self, protocol: &Protocol, command: TicketCommand) -> Result<Applied> {
        let now = self.clock.now();
        let applied = self
            .chat
            .commit_and_publish(protocol, || self.store.apply(protocol, command, now))
            .await?;

        for kind in &applied.notifications {
            self.notifications.dispatch(applied.ticket.clone(), *kind);
        }

        for message in &applied.messages {
            match message.kind {
                MessageKind::StatusChange => {
                    TicketMetrics::record_status_change(applied.ticket.status.as_str());
                    tracing::info!(status = applied.ticket.status.as_str(), "Ticket status changed");
                },
                MessageKind::Comment => TicketMetrics::record_comment(),
                MessageKind::Chat | MessageKind::Event => {},
            }
        }

        if !applied.changed() {
            tracing::debug!("Ticket unchanged");
        }

        Ok(applied)
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("protocols", &self.protocols)
            .finish_non_exhaustive()
    }
}
