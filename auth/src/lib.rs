//! # Helpdesk Auth
//!
//! Staff authentication and authorization.
//!
//! - [`PasswordHasher`]: Argon2id password hashing
//! - [`SessionStore`] / [`InMemorySessionStore`]: opaque bearer tokens with a TTL
//! - [`AccessGateway`]: login, logout, token resolution and admin-gated registration
//! - [`RolePolicy`]: staff may work tickets, admins may also register staff
//!
//! Customers are anonymous; only staff operations go through this crate.
//!
//! ## Example
//!
//! ```
//! use helpdesk_auth::{AccessGateway, InMemorySessionStore, RolePolicy};
//! use helpdesk_core::environment::SystemClock;
//! use helpdesk_testing::InMemoryUserRepository;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let gateway: AccessGateway<InMemoryUserRepository> = AccessGateway::new(
//!     Arc::new(InMemoryUserRepository::new()),
//!     InMemorySessionStore::default(),
//!     Arc::new(RolePolicy),
//!     Arc::new(SystemClock),
//!     chrono::Duration::hours(8),
//! );
//!
//! gateway.ensure_admin("Root", "root@helpdesk.test", "change-me-now").await.unwrap();
//! let login = gateway.login("root@helpdesk.test", "change-me-now").await.unwrap();
//! let actor = gateway.resolve(&login.session.token).await.unwrap();
//! assert!(actor.is_admin);
//! # });
//! ```

pub mod error;
pub mod gateway;
pub mod password;
pub mod policy;
pub mod session;

pub use error::{AuthError, Result};
pub use gateway::{AccessGateway, Login, NewStaff};
pub use password::{MIN_PASSWORD_LENGTH, PasswordHasher};
pub use policy::RolePolicy;
pub use session::{InMemorySessionStore, Session, SessionStore, generate_token};
