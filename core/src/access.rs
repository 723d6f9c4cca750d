//! Authorization decisions consumed by the core.

use crate::user::Actor;

/// Operations that need an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Change a ticket's status or leave an internal comment.
    MutateTicket,
    /// Register a new staff account.
    RegisterStaff,
}

/// Answers "may this actor do that?".
///
/// The core only consumes the boolean; authentication happens before an
/// [`Actor`] exists.
pub trait Authorizer: Send + Sync {
    /// Returns `true` if `actor` holds `permission`.
    fn authorize(&self, actor: &Actor, permission: Permission) -> bool;
}
