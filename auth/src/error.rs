//! Error types for authentication and authorization operations.

use helpdesk_core::HelpdeskError;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failure modes of the access gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Authentication Errors
    // ═══════════════════════════════════════════════════════════
    /// Unknown email or wrong password. The two are not distinguished.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token does not name a live session.
    #[error("Session not found")]
    SessionNotFound,

    /// Session TTL elapsed.
    #[error("Session has expired")]
    SessionExpired,

    // ═══════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════
    /// Authenticated, but not allowed to do this.
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Required permission that was missing
        required: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Input Errors
    // ═══════════════════════════════════════════════════════════
    /// Registration input rejected.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════
    /// Hashing or verifying a password failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Failure reported by the user repository.
    #[error(transparent)]
    Store(#[from] HelpdeskError),

    /// Anything else.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Returns `true` when the caller is authenticated but lacks a permission.
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self, Self::InsufficientPermissions { .. })
    }
}

impl From<AuthError> for HelpdeskError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InsufficientPermissions { .. } => Self::Unauthorized(error.to_string()),
            AuthError::Validation(msg) => Self::Validation(msg),
            AuthError::Store(inner) => inner,
            AuthError::PasswordHash(msg) | AuthError::InternalError(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_and_sessions_map_to_unauthorized() {
        for error in [
            AuthError::InvalidCredentials,
            AuthError::SessionNotFound,
            AuthError::SessionExpired,
        ] {
            assert!(matches!(HelpdeskError::from(error), HelpdeskError::Unauthorized(_)));
        }
    }

    #[test]
    fn test_store_errors_pass_through() {
        let conflict = HelpdeskError::Conflict("email taken".to_string());
        assert_eq!(HelpdeskError::from(AuthError::Store(conflict.clone())), conflict);
    }

    #[test]
    fn test_forbidden() {
        let error = AuthError::InsufficientPermissions {
            required: "register_staff".to_string(),
        };
        assert!(error.is_forbidden());
        assert!(!AuthError::InvalidCredentials.is_forbidden());
    }
}
