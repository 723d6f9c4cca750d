//! Staff identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a staff user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A staff or admin account.
///
/// The email never changes after creation; uniqueness is enforced by the
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email (unique).
    pub email: String,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Administrator flag.
    pub is_admin: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The acting identity of this user.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.name.clone(), self.is_admin)
    }
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Administrator flag.
    pub is_admin: bool,
}

/// The authenticated staff identity performing a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Who is acting.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Administrator flag.
    pub is_admin: bool,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub fn new(user_id: UserId, name: impl Into<String>, is_admin: bool) -> Self {
        Self {
            user_id,
            name: name.into(),
            is_admin,
        }
    }

    /// Author label used on messages written by this actor.
    ///
    /// ```
    /// # use helpdesk_core::{Actor, UserId};
    /// let actor = Actor::new(UserId::new(), "Dana", false);
    /// assert_eq!(actor.label(), "Support (Dana)");
    /// ```
    #[must_use]
    pub fn label(&self) -> String {
        format!("Support ({})", self.name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User {
            id: UserId::new(),
            name: "Dana".to_string(),
            email: "dana@helpdesk.test".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            is_admin: true,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_user_actor_carries_admin_flag() {
        let id = UserId::new();
        let user = User {
            id,
            name: "Dana".to_string(),
            email: "dana@helpdesk.test".to_string(),
            password_hash: String::new(),
            is_admin: true,
            created_at: Utc::now(),
        };
        assert_eq!(user.actor(), Actor::new(id, "Dana", true));
    }
}
