//! Role-based authorization.

use helpdesk_core::{Actor, Authorizer, Permission};

/// The helpdesk's two-role policy.
///
/// Any authenticated staff member may work tickets; only administrators may
/// register new staff.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl Authorizer for RolePolicy {
    fn authorize(&self, actor: &Actor, permission: Permission) -> bool {
        match permission {
            Permission::MutateTicket => true,
            Permission::RegisterStaff => actor.is_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_testing::fixtures;

    #[test]
    fn test_staff_can_mutate_tickets() {
        assert!(RolePolicy.authorize(&fixtures::staff_actor(), Permission::MutateTicket));
        assert!(RolePolicy.authorize(&fixtures::admin_actor(), Permission::MutateTicket));
    }

    #[test]
    fn test_only_admins_register_staff() {
        assert!(!RolePolicy.authorize(&fixtures::staff_actor(), Permission::RegisterStaff));
        assert!(RolePolicy.authorize(&fixtures::admin_actor(), Permission::RegisterStaff));
    }
}
