//! # Helpdesk Runtime
//!
//! The services that give the helpdesk its behavior:
//!
//! - [`LifecycleManager`]: opens tickets and drives status transitions
//! - [`ChatCoordinator`]: per-ticket rooms, ordered persistence and fan-out
//! - [`NotificationDispatcher`]: fire-and-forget delivery through a [`Notifier`](helpdesk_core::Notifier)
//! - [`ProtocolGenerator`]: unique, time-derived tracking codes
//! - [`metrics`]: Prometheus exporter and metric names
//!
//! Every service is constructed explicitly and shared by `Arc`; nothing here
//! is global except the metrics recorder.
//!
//! ## Example
//!
//! ```
//! use helpdesk_runtime::{ChatCoordinator, LifecycleManager, NotificationDispatcher, ProtocolGenerator};
//! use helpdesk_core::environment::{Clock, SystemClock};
//! use helpdesk_testing::{fixtures, InMemoryTicketStore, RecordingNotifier, StaticAuthorizer};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(InMemoryTicketStore::new());
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let chat = Arc::new(ChatCoordinator::new(store.clone(), clock.clone()));
//! let manager = LifecycleManager::new(
//!     store,
//!     Arc::new(StaticAuthorizer::allow_all()),
//!     NotificationDispatcher::new(Arc::new(RecordingNotifier::new())),
//!     chat,
//!     ProtocolGenerator::new(clock.clone(), -180),
//!     clock,
//! );
//!
//! let ticket = manager.open_ticket(fixtures::submission()).await.unwrap();
//! assert!(ticket.protocol.is_well_formed());
//! # });
//! ```

pub mod chat;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod protocol;

pub use chat::{ChatBroadcast, ChatCoordinator, ConnectionId};
pub use lifecycle::{LifecycleManager, TicketUpdateOutcome};
pub use notify::{
    ConsoleNotifier, NotificationDispatcher, NotificationEmail, RecipientPolicy, SmtpNotifier,
    SmtpSettings,
};
pub use protocol::ProtocolGenerator;
