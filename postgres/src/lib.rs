//! `PostgreSQL` persistence for the helpdesk.
//!
//! Implements [`TicketStore`](helpdesk_core::store::TicketStore) and
//! [`UserRepository`](helpdesk_core::store::UserRepository) on top of a sqlx
//! [`PgPool`].
//!
//! # Schema
//!
//! The embedded migrations create three tables:
//!
//! - `users`: staff accounts, unique by email
//! - `tickets`: unique by protocol
//! - `messages`: the per-ticket log, read back by `(sent_at, id)`
//!
//! # Example
//!
//! ```no_run
//! use helpdesk_postgres::{PoolSettings, PostgresTicketStore, connect, migrate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect(&PoolSettings::new("postgres://localhost/helpdesk")).await?;
//! migrate(&pool).await?;
//! let store = PostgresTicketStore::new(pool);
//! # Ok(())
//! # }
//! ```

use helpdesk_core::{HelpdeskError, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

mod ticket_store;
mod user_repository;

pub use ticket_store::PostgresTicketStore;
pub use user_repository::PostgresUserRepository;

/// Connection pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Connection string.
    pub url: String,
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a connection before failing.
    pub connect_timeout: Duration,
}

impl PoolSettings {
    /// Default sizing for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`HelpdeskError::Database`] if the database cannot be reached.
pub async fn connect(settings: &PoolSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.connect_timeout)
        .connect(&settings.url)
        .await
        .map_err(|e| HelpdeskError::Database(format!("Failed to connect: {e}")))?;

    tracing::info!(
        max_connections = settings.max_connections,
        "Connected to PostgreSQL"
    );

    Ok(pool)
}

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns [`HelpdeskError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| HelpdeskError::Database(format!("Migration failed: {e}")))?;
    Ok(())
}

/// Map a sqlx error, turning unique violations into [`HelpdeskError::Conflict`].
pub(crate) fn map_db_error(context: &str, error: sqlx::Error) -> HelpdeskError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            metrics::counter!("helpdesk.store.conflicts").increment(1);
            HelpdeskError::Conflict(format!("{context}: {}", db.message()))
        },
        _ => HelpdeskError::Database(format!("{context}: {error}")),
    }
}
