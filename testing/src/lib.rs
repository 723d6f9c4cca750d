//! # Helpdesk Testing
//!
//! Testing utilities and helpers for the helpdesk crates.
//!
//! This crate provides:
//! - Mock implementations of Environment traits ([`FixedClock`], [`ManualClock`])
//! - In-memory providers ([`InMemoryTicketStore`], [`InMemoryUserRepository`])
//! - A [`RecordingNotifier`] that captures notifications and can be told to fail
//! - Fixtures and proptest strategies for domain types
//! - The [`ReducerTest`] Given-When-Then harness
//!
//! ## Example
//!
//! ```
//! use helpdesk_core::store::TicketStore;
//! use helpdesk_testing::{fixtures, InMemoryTicketStore};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryTicketStore::new();
//! let ticket = store
//!     .insert_ticket(fixtures::new_ticket("TICKET-20250101090000"))
//!     .await
//!     .unwrap();
//! assert_eq!(store.find_ticket(&ticket.protocol).await.unwrap(), Some(ticket));
//! # });
//! ```

use chrono::{DateTime, Utc};
use helpdesk_core::environment::Clock;

pub mod notifier;
pub mod store;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use helpdesk_testing::mocks::FixedClock;
    /// use helpdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that only moves when told to.
    ///
    /// ```
    /// use helpdesk_testing::mocks::ManualClock;
    /// use helpdesk_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let start = Utc::now();
    /// let clock = ManualClock::new(start);
    /// clock.advance(Duration::seconds(5));
    /// assert_eq!(clock.now(), start + Duration::seconds(5));
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward (or backward, with a negative duration).
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

/// Ready-made domain values.
pub mod fixtures {
    use super::mocks::test_clock;
    use helpdesk_core::environment::Clock;
    use helpdesk_core::{
        Actor, Authorizer, NewTicket, Permission, Protocol, Ticket, TicketSubmission, UserId,
    };

    /// The canonical submission used across scenarios.
    #[must_use]
    pub fn submission() -> TicketSubmission {
        TicketSubmission {
            customer_name: "Ana".to_string(),
            customer_email: "ana@x.com".to_string(),
            sector: "IT".to_string(),
            role: "Analyst".to_string(),
            description: "printer jam".to_string(),
            attachment: None,
        }
    }

    /// [`submission`] ready for insertion under `protocol`.
    #[must_use]
    pub fn new_ticket(protocol: &str) -> NewTicket {
        submission().into_new_ticket(Protocol::new(protocol), test_clock().now())
    }

    /// [`new_ticket`] with id 1.
    #[must_use]
    pub fn ticket(protocol: &str) -> Ticket {
        new_ticket(protocol).with_id(1)
    }

    /// A non-admin staff member named Dana.
    #[must_use]
    pub fn staff_actor() -> Actor {
        Actor::new(UserId::new(), "Dana", false)
    }

    /// An administrator named Root.
    #[must_use]
    pub fn admin_actor() -> Actor {
        Actor::new(UserId::new(), "Root", true)
    }

    /// Authorizer with a fixed answer.
    #[derive(Debug, Clone, Copy)]
    pub struct StaticAuthorizer {
        allow: bool,
    }

    impl StaticAuthorizer {
        /// Grants everything.
        #[must_use]
        pub const fn allow_all() -> Self {
            Self { allow: true }
        }

        /// Denies everything.
        #[must_use]
        pub const fn deny_all() -> Self {
            Self { allow: false }
        }
    }

    impl Authorizer for StaticAuthorizer {
        fn authorize(&self, _actor: &Actor, _permission: Permission) -> bool {
            self.allow
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use helpdesk_core::{TicketStatus, TicketSubmission};
    use proptest::prelude::*;

    /// Any ticket status.
    pub fn status() -> impl Strategy<Value = TicketStatus> {
        prop::sample::select(TicketStatus::ALL.to_vec())
    }

    /// Sequences of status changes.
    pub fn status_sequence(max_len: usize) -> impl Strategy<Value = Vec<TicketStatus>> {
        prop::collection::vec(status(), 0..max_len)
    }

    /// Submissions that pass validation.
    pub fn valid_submission() -> impl Strategy<Value = TicketSubmission> {
        (
            "[A-Z][a-z]{1,12}",
            "[a-z]{1,8}@[a-z]{1,8}\\.com",
            "[A-Za-z]{2,10}",
            "[A-Za-z]{2,10}",
            "[a-z ]{0,40}[a-z]",
        )
            .prop_map(|(name, email, sector, role, description)| TicketSubmission {
                customer_name: name,
                customer_email: email,
                sector,
                role,
                description,
                attachment: None,
            })
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use fixtures::StaticAuthorizer;
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use notifier::RecordingNotifier;
pub use reducer_test::ReducerTest;
pub use store::{InMemoryTicketStore, InMemoryUserRepository};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_fixture_submission_is_valid() {
        assert!(fixtures::submission().validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_generated_submissions_validate(form in properties::valid_submission()) {
            prop_assert!(form.validate().is_ok());
        }
    }
}
