//! # Helpdesk Web
//!
//! HTTP and WebSocket surface of the helpdesk, built on axum.
//!
//! ## Components
//!
//! - [`config`]: environment-driven configuration
//! - [`state`]: the services shared by every handler
//! - [`handlers`]: public submission, chat, staff dashboard and sessions
//! - [`extractors`]: bearer tokens and staff identity
//! - [`middleware`]: request ids
//! - [`error`]: [`AppError`] and its mapping to HTTP statuses
//! - [`routes`]: the router
//!
//! ## Example
//!
//! ```no_run
//! use helpdesk_web::{AppState, Backends, ServiceSettings, build_router};
//! use helpdesk_core::environment::SystemClock;
//! use helpdesk_runtime::{ConsoleNotifier, RecipientPolicy};
//! use helpdesk_testing::{InMemoryTicketStore, InMemoryUserRepository};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let state = AppState::assemble(
//!     Backends {
//!         tickets: Arc::new(InMemoryTicketStore::new()),
//!         users: Arc::new(InMemoryUserRepository::new()),
//!         notifier: Arc::new(ConsoleNotifier::new(RecipientPolicy::default())),
//!         clock: Arc::new(SystemClock),
//!     },
//!     ServiceSettings {
//!         session_ttl: chrono::Duration::hours(8),
//!         utc_offset_minutes: -180,
//!     },
//! );
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, build_router(state)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use error::AppError;
pub use extractors::{BearerToken, RequestId, StaffActor};
pub use routes::{build_router, metrics_router};
pub use state::{AppState, Backends, Gateway, ServiceSettings};

/// Result type for web handlers.
pub type WebResult<T> = Result<T, AppError>;
