//! The access gateway: login, sessions, staff registration.

use crate::error::{AuthError, Result};
use crate::password::{MIN_PASSWORD_LENGTH, PasswordHasher};
use crate::session::{InMemorySessionStore, Session, SessionStore, generate_token};
use chrono::Duration;
use helpdesk_core::environment::Clock;
use helpdesk_core::store::UserRepository;
use helpdesk_core::{Actor, Authorizer, NewUser, Permission, User};
use serde::Deserialize;
use std::sync::Arc;

/// Registration request for a new staff account.
#[derive(Clone, Deserialize)]
pub struct NewStaff {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
    /// Grant administrator rights.
    #[serde(default)]
    pub is_admin: bool,
}

impl std::fmt::Debug for NewStaff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewStaff")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("is_admin", &self.is_admin)
            .finish_non_exhaustive()
    }
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct Login {
    /// The new session.
    pub session: Session,
    /// Who logged in.
    pub user: User,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_staff(name: &str, email: &str, password: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AuthError::Validation("name is required".to_string()));
    }
    if email.is_empty() {
        return Err(AuthError::Validation("email is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AuthError::Validation("email is not a valid email address".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Authenticates staff and resolves bearer tokens to [`Actor`]s.
///
/// Customers never authenticate; this gateway only guards staff operations.
pub struct AccessGateway<U: UserRepository + ?Sized, S: SessionStore = InMemorySessionStore> {
    users: Arc<U>,
    sessions: S,
    authorizer: Arc<dyn Authorizer>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

impl<U: UserRepository + ?Sized, S: SessionStore> AccessGateway<U, S> {
    /// Create a gateway.
    #[must_use]
    pub fn new(
        users: Arc<U>,
        sessions: S,
        authorizer: Arc<dyn Authorizer>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            authorizer,
            hasher: PasswordHasher::new(),
            clock,
            session_ttl,
        }
    }

    /// Verify credentials and open a session.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] for an unknown email or wrong password
    /// - [`AuthError::Store`] if the user lookup fails
    #[tracing::instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<Login> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::info!("Login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        let session = Session {
            token: generate_token(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.sessions.create_session(&session).await?;

        tracing::info!(user_id = %user.id, expires_at = %session.expires_at, "Staff logged in");

        Ok(Login { session, user })
    }

    /// Revoke a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.delete_session(token).await
    }

    /// Resolve a bearer token to the acting staff identity.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionNotFound`] for an unknown token or a deleted user
    /// - [`AuthError::SessionExpired`] once the TTL has elapsed
    pub async fn resolve(&self, token: &str) -> Result<Actor> {
        let session = self.sessions.get_session(token).await?;

        match self.users.find_by_id(session.user_id).await? {
            Some(user) => Ok(user.actor()),
            None => {
                self.sessions.delete_session(token).await?;
                Err(AuthError::SessionNotFound)
            },
        }
    }

    /// Register a staff account on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InsufficientPermissions`] if `actor` is not an administrator
    /// - [`AuthError::Validation`] for empty fields or a short password
    /// - [`AuthError::Store`] wrapping [`Conflict`](helpdesk_core::HelpdeskError::Conflict) for a taken email
    #[tracing::instrument(skip_all, fields(actor = %actor.user_id))]
    pub async fn register(&self, actor: &Actor, staff: NewStaff) -> Result<User> {
        if !self.authorizer.authorize(actor, Permission::RegisterStaff) {
            tracing::warn!("Registration refused: actor is not an administrator");
            return Err(AuthError::InsufficientPermissions {
                required: "register_staff".to_string(),
            });
        }

        self.create(staff).await
    }

    /// Create an administrator account unless one with `email` already exists.
    ///
    /// Returns the new user, or `None` if the account was already there.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Validation`] if the bootstrap credentials are unusable
    /// - [`AuthError::Store`] if the repository fails
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<Option<User>> {
        if self.users.find_by_email(&normalize_email(email)).await?.is_some() {
            tracing::debug!("Bootstrap administrator already exists");
            return Ok(None);
        }

        let user = self
            .create(NewStaff {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                is_admin: true,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Bootstrap administrator created");
        Ok(Some(user))
    }

    async fn create(&self, staff: NewStaff) -> Result<User> {
        let email = normalize_email(&staff.email);
        validate_staff(&staff.name, &email, &staff.password)?;

        let password_hash = self.hash_password(staff.password).await?;
        let user = self
            .users
            .create_user(NewUser {
                name: staff.name.trim().to_string(),
                email,
                password_hash,
                is_admin: staff.is_admin,
            })
            .await?;

        tracing::info!(user_id = %user.id, is_admin = user.is_admin, "Staff registered");
        Ok(user)
    }

    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::InternalError(format!("Hashing task failed: {e}")))?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let hasher = self.hasher;
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::InternalError(format!("Verification task failed: {e}")))?
    }
}

impl<U: UserRepository + ?Sized, S: SessionStore> std::fmt::Debug for AccessGateway<U, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGateway")
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::policy::RolePolicy;
    use helpdesk_core::HelpdeskError;
    use helpdesk_testing::{InMemoryUserRepository, ManualClock, fixtures, test_clock};

    struct Harness {
        gateway: AccessGateway<InMemoryUserRepository>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(test_clock().now()));
        let gateway = AccessGateway::new(
            Arc::new(InMemoryUserRepository::new()),
            InMemorySessionStore::new(clock.clone()),
            Arc::new(RolePolicy),
            clock.clone(),
            Duration::hours(8),
        );
        Harness { gateway, clock }
    }

    fn dana() -> NewStaff {
        NewStaff {
            name: "Dana".to_string(),
            email: "dana@helpdesk.test".to_string(),
            password: "s3cret-pass".to_string(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_admin_registers_staff_who_can_log_in() {
        let h = harness();
        let user = h.gateway.register(&fixtures::admin_actor(), dana()).await.unwrap();
        assert!(!user.is_admin);
        assert!(user.password_hash.starts_with("$argon2"));

        let login = h.gateway.login("Dana@Helpdesk.test ", "s3cret-pass").await.unwrap();
        assert_eq!(login.user.id, user.id);
        assert_eq!(login.session.expires_at, test_clock().now() + Duration::hours(8));

        let actor = h.gateway.resolve(&login.session.token).await.unwrap();
        assert_eq!(actor, user.actor());
        assert_eq!(actor.label(), "Support (Dana)");
    }

    #[tokio::test]
    async fn test_non_admin_cannot_register() {
        let h = harness();
        let err = h.gateway.register(&fixtures::staff_actor(), dana()).await.unwrap_err();

        assert!(err.is_forbidden());
        assert!(matches!(HelpdeskError::from(err), HelpdeskError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let h = harness();
        let admin = fixtures::admin_actor();
        h.gateway.register(&admin, dana()).await.unwrap();

        let mut again = dana();
        again.email = "DANA@helpdesk.test".to_string();
        let err = h.gateway.register(&admin, again).await.unwrap_err();

        assert!(matches!(err, AuthError::Store(HelpdeskError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let h = harness();
        let admin = fixtures::admin_actor();

        let mut short = dana();
        short.password = "1234567".to_string();
        let mut nameless = dana();
        nameless.name = "  ".to_string();
        let mut bad_email = dana();
        bad_email.email = "dana".to_string();

        for staff in [short, nameless, bad_email] {
            let err = h.gateway.register(&admin, staff).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let h = harness();
        h.gateway.register(&fixtures::admin_actor(), dana()).await.unwrap();

        let wrong = h.gateway.login("dana@helpdesk.test", "not-the-password").await.unwrap_err();
        let unknown = h.gateway.login("nobody@helpdesk.test", "s3cret-pass").await.unwrap_err();

        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(unknown, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_session_expires_and_logout_revokes() {
        let h = harness();
        h.gateway.register(&fixtures::admin_actor(), dana()).await.unwrap();

        let first = h.gateway.login("dana@helpdesk.test", "s3cret-pass").await.unwrap();
        h.gateway.logout(&first.session.token).await.unwrap();
        assert_eq!(
            h.gateway.resolve(&first.session.token).await.unwrap_err(),
            AuthError::SessionNotFound
        );

        let second = h.gateway.login("dana@helpdesk.test", "s3cret-pass").await.unwrap();
        h.clock.advance(Duration::hours(8));
        assert_eq!(
            h.gateway.resolve(&second.session.token).await.unwrap_err(),
            AuthError::SessionExpired
        );
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let h = harness();

        let created = h
            .gateway
            .ensure_admin("Root", "root@helpdesk.test", "bootstrap-pass")
            .await
            .unwrap();
        assert!(created.is_some_and(|u| u.is_admin));

        let again = h
            .gateway
            .ensure_admin("Root", "root@helpdesk.test", "other-pass")
            .await
            .unwrap();
        assert!(again.is_none());

        let login = h.gateway.login("root@helpdesk.test", "bootstrap-pass").await.unwrap();
        assert!(login.user.is_admin);
    }
}
