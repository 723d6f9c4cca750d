//! Ticket status state machine.
//!
//! [`TicketReducer`] is pure: it mutates the ticket it is given and describes
//! the writes and notifications that follow. Stores run it while holding the
//! ticket's lock and execute the returned [`TicketEffect`]s in one
//! transaction; notifications are dispatched only after commit.
//!
//! Any status may move to any other. Moving to the current status is a no-op.

use crate::environment::Clock;
use crate::message::{MessageKind, NewMessage};
use crate::notifier::EventKind;
use crate::reducer::Reducer;
use crate::ticket::{Ticket, TicketStatus};
use crate::user::Actor;
use smallvec::{SmallVec, smallvec};

/// Mutating commands on an existing ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketCommand {
    /// Move the ticket to `status`.
    ChangeStatus {
        /// Target status
        status: TicketStatus,
        /// Who is acting
        actor: Actor,
    },
    /// Leave an internal note.
    AddComment {
        /// Who is acting
        actor: Actor,
        /// Note body
        text: String,
    },
    /// Status change and comment submitted together. Status is applied first.
    Update {
        /// Optional target status
        status: Option<TicketStatus>,
        /// Optional note body
        comment: Option<String>,
        /// Who is acting
        actor: Actor,
    },
}

impl TicketCommand {
    /// The acting identity.
    #[must_use]
    pub const fn actor(&self) -> &Actor {
        match self {
            Self::ChangeStatus { actor, .. }
            | Self::AddComment { actor, .. }
            | Self::Update { actor, .. } => actor,
        }
    }
}

/// Side effects produced by [`TicketReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketEffect {
    /// Persist the new status.
    SetStatus(TicketStatus),
    /// Persist a message in the ticket's log.
    AppendMessage(NewMessage),
    /// Notify interested parties once committed.
    Notify(EventKind),
}

/// The ticket state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketReducer;

impl TicketReducer {
    fn change_status(
        ticket: &mut Ticket,
        status: TicketStatus,
        actor: &Actor,
        env: &dyn Clock,
        effects: &mut SmallVec<[TicketEffect; 4]>,
    ) {
        if ticket.status == status {
            return;
        }

        ticket.status = status;
        effects.push(TicketEffect::SetStatus(status));
        effects.push(TicketEffect::AppendMessage(NewMessage {
            ticket_protocol: ticket.protocol.clone(),
            author: actor.label(),
            content: status_change_text(status),
            sent_at: env.now(),
            kind: MessageKind::StatusChange,
        }));
        effects.push(TicketEffect::Notify(EventKind::Update));
    }

    fn add_comment(
        ticket: &Ticket,
        text: &str,
        actor: &Actor,
        env: &dyn Clock,
        effects: &mut SmallVec<[TicketEffect; 4]>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        effects.push(TicketEffect::AppendMessage(NewMessage {
            ticket_protocol: ticket.protocol.clone(),
            author: actor.label(),
            content: text.to_string(),
            sent_at: env.now(),
            kind: MessageKind::Comment,
        }));
    }
}

impl Reducer for TicketReducer {
    type State = Ticket;
    type Action = TicketCommand;
    type Effect = TicketEffect;
    type Environment = dyn Clock;

    fn reduce(
        &self,
        state: &mut Ticket,
        action: TicketCommand,
        env: &dyn Clock,
    ) -> SmallVec<[TicketEffect; 4]> {
        let mut effects = smallvec![];

        match action {
            TicketCommand::ChangeStatus { status, actor } => {
                Self::change_status(state, status, &actor, env, &mut effects);
            },
            TicketCommand::AddComment { actor, text } => {
                Self::add_comment(state, &text, &actor, env, &mut effects);
            },
            TicketCommand::Update {
                status,
                comment,
                actor,
            } => {
                if let Some(status) = status {
                    Self::change_status(state, status, &actor, env, &mut effects);
                }
                if let Some(comment) = comment {
                    Self::add_comment(state, &comment, &actor, env, &mut effects);
                }
            },
        }

        effects
    }
}

/// Content of the system message recording a status change.
#[must_use]
pub fn status_change_text(status: TicketStatus) -> String {
    format!("status changed to {}", status.label())
}

/// Effects grouped the way a store executes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectPlan {
    /// Final status to persist, if it changed.
    pub status: Option<TicketStatus>,
    /// Messages to insert, in order.
    pub messages: Vec<NewMessage>,
    /// Notifications to dispatch after commit.
    pub notifications: Vec<EventKind>,
}

impl EffectPlan {
    /// Returns `true` if nothing needs to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.messages.is_empty()
    }
}

impl FromIterator<TicketEffect> for EffectPlan {
    fn from_iter<I: IntoIterator<Item = TicketEffect>>(iter: I) -> Self {
        let mut plan = Self::default();
        for effect in iter {
            match effect {
                TicketEffect::SetStatus(status) => plan.status = Some(status),
                TicketEffect::AppendMessage(message) => plan.messages.push(message),
                TicketEffect::Notify(kind) => plan.notifications.push(kind),
            }
        }
        plan
    }
}
