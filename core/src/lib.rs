//! # Helpdesk Core
//!
//! Domain types and pure business logic for the support-ticket helpdesk.
//!
//! This crate owns everything that does not perform I/O:
//!
//! - **Domain model**: [`Ticket`], [`Message`], [`User`], [`Actor`]
//! - **State machine**: [`lifecycle::TicketReducer`] decides what a status change
//!   or comment does to a ticket and which side effects follow
//! - **Provider traits**: [`store::TicketStore`], [`store::UserRepository`],
//!   [`notifier::Notifier`], [`access::Authorizer`] and [`environment::Clock`]
//!   are implemented by the `postgres`, `runtime`, `auth` and `testing` crates
//! - **Error taxonomy**: [`HelpdeskError`]
//!
//! ## Architecture
//!
//! ```text
//! Command ──► TicketReducer (pure) ──► Vec<TicketEffect>
//!                                          │
//!                   ┌──────────────────────┴───────────────┐
//!                   ▼                                      ▼
//!        SetStatus / AppendMessage                    Notify(kind)
//!        (executed inside the store's           (dispatched after commit,
//!         transaction, all or nothing)            fire-and-forget)
//! ```
//!
//! ## Example
//!
//! ```
//! use helpdesk_core::lifecycle::{TicketCommand, TicketEffect, TicketReducer};
//! use helpdesk_core::reducer::Reducer;
//! use helpdesk_core::environment::SystemClock;
//! use helpdesk_core::{Actor, Protocol, Ticket, TicketStatus, UserId, Utc};
//!
//! let mut ticket = Ticket {
//!     id: 1,
//!     protocol: Protocol::new("TICKET-20250101090000"),
//!     customer_name: "Ana".into(),
//!     customer_email: "ana@example.com".into(),
//!     sector: "IT".into(),
//!     role: "Analyst".into(),
//!     description: "Printer is jammed".into(),
//!     status: TicketStatus::AwaitingResponse,
//!     created_at: Utc::now(),
//!     attachment: None,
//! };
//! let actor = Actor::new(UserId::new(), "Dana", false);
//!
//! let effects = TicketReducer.reduce(
//!     &mut ticket,
//!     TicketCommand::ChangeStatus { status: TicketStatus::Resolved, actor },
//!     &SystemClock,
//! );
//!
//! assert_eq!(ticket.status, TicketStatus::Resolved);
//! assert!(matches!(effects[0], TicketEffect::SetStatus(TicketStatus::Resolved)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod notifier;
pub mod store;
pub mod ticket;
pub mod user;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

pub use access::{Authorizer, Permission};
pub use error::{HelpdeskError, Result};
pub use message::{Message, MessageKind, NewMessage, SYSTEM_AUTHOR};
pub use notifier::{EventKind, Notifier};
pub use ticket::{NewTicket, Protocol, Ticket, TicketStatus, TicketSubmission};
pub use user::{Actor, NewUser, User, UserId};

/// Reducer module - the core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They validate the action, update state in place and return descriptions of the
/// side effects the caller must execute. They never perform I/O themselves.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Effect`: The effect descriptions returned to the executor
    /// - `Environment`: The injected dependencies this reducer needs (may be a trait object)
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The effect type this reducer produces
        type Effect;

        /// The environment type with injected dependencies
        type Environment: ?Sized;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// Most actions produce at most a handful of effects, so the
        /// result is a `SmallVec` to avoid heap allocation.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Self::Effect; 4]>;
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// into services through their constructors.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use helpdesk_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let now = clock.now();
    /// assert!(now.timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// A timestamp is a clock stopped at that instant.
    ///
    /// Stores use this to run the ticket reducer at the time the caller
    /// observed.
    impl Clock for DateTime<Utc> {
        fn now(&self) -> DateTime<Utc> {
            *self
        }
    }
}
