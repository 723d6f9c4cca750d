//! Error taxonomy shared by every helpdesk crate.

use thiserror::Error;

/// Result type alias for helpdesk operations.
pub type Result<T> = std::result::Result<T, HelpdeskError>;

/// All failure modes of the helpdesk core.
///
/// Variants are grouped by how the caller is expected to react: user errors
/// are surfaced verbatim to the submitting client, system errors abort the
/// transaction and surface as a generic failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HelpdeskError {
    // ═══════════════════════════════════════════════════════════
    // User Errors
    // ═══════════════════════════════════════════════════════════
    /// A ticket, user or connection lookup missed.
    #[error("{resource} {key} not found")]
    NotFound {
        /// Kind of resource ("ticket", "user", ...)
        resource: &'static str,
        /// Lookup key that missed
        key: String,
    },

    /// A unique key (user email, ticket protocol) already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The actor is not allowed to perform the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A required field is missing or malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A chat connection tried to act on a room it has not joined.
    #[error("Connection is not a member of room {room}")]
    NotMember {
        /// Room (ticket protocol) the connection tried to use
        room: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════
    /// Notification delivery failed. Never escapes the notification dispatcher.
    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    /// Persistence layer failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Anything else that should not be exposed to users.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HelpdeskError {
    /// Shorthand for a missing ticket.
    #[must_use]
    pub fn ticket_not_found(protocol: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "ticket",
            key: protocol.into(),
        }
    }

    /// Returns `true` if the error is caused by the caller's input and is
    /// safe to show to them.
    ///
    /// # Examples
    ///
    /// ```
    /// # use helpdesk_core::HelpdeskError;
    /// assert!(HelpdeskError::Validation("name is required".into()).is_user_error());
    /// assert!(!HelpdeskError::Database("connection reset".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Conflict(_)
                | Self::Unauthorized(_)
                | Self::Validation(_)
                | Self::NotMember { .. }
        )
    }
}
