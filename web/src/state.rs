//! Application state for the helpdesk HTTP server.
//!
//! Every service is built once at startup and shared by `Arc`; cloning the
//! state per request is cheap.

use helpdesk_auth::{AccessGateway, InMemorySessionStore, RolePolicy};
use helpdesk_core::environment::Clock;
use helpdesk_core::store::{TicketStore, UserRepository};
use helpdesk_core::{Authorizer, Notifier};
use helpdesk_runtime::{ChatCoordinator, LifecycleManager, NotificationDispatcher, ProtocolGenerator};
use std::sync::Arc;

/// The access gateway as wired into the server.
pub type Gateway = AccessGateway<dyn UserRepository, InMemorySessionStore>;

/// Storage and delivery backends the services are built on.
pub struct Backends {
    /// Ticket and message storage
    pub tickets: Arc<dyn TicketStore>,
    /// Staff accounts
    pub users: Arc<dyn UserRepository>,
    /// Notification channel
    pub notifier: Arc<dyn Notifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// Service tuning that does not come from the backends.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Staff session lifetime
    pub session_ttl: chrono::Duration,
    /// Offset from UTC, in minutes, protocols are rendered in
    pub utc_offset_minutes: i32,
}

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ticket lifecycle operations
    pub lifecycle: Arc<LifecycleManager>,
    /// Realtime chat rooms
    pub chat: Arc<ChatCoordinator>,
    /// Staff authentication
    pub gateway: Arc<Gateway>,
}

impl AppState {
    /// Build every service on top of `backends`.
    #[must_use]
    pub fn assemble(backends: Backends, settings: ServiceSettings) -> Self {
        let Backends {
            tickets,
            users,
            notifier,
            clock,
        } = backends;

        let authorizer: Arc<dyn Authorizer> = Arc::new(RolePolicy);
        let chat = Arc::new(ChatCoordinator::new(Arc::clone(&tickets), Arc::clone(&clock)));
        let lifecycle = Arc::new(LifecycleManager::new(
            tickets,
            Arc::clone(&authorizer),
            NotificationDispatcher::new(notifier),
            Arc::clone(&chat),
            ProtocolGenerator::new(Arc::clone(&clock), settings.utc_offset_minutes),
            Arc::clone(&clock),
        ));
        let gateway = Arc::new(AccessGateway::new(
            users,
            InMemorySessionStore::new(Arc::clone(&clock)),
            authorizer,
            clock,
            settings.session_ttl,
        ));

        Self {
            lifecycle,
            chat,
            gateway,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("lifecycle", &self.lifecycle)
            .field("chat", &self.chat)
            .finish_non_exhaustive()
    }
}
