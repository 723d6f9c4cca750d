//! Console notifier for development.

use super::{NotificationEmail, RecipientPolicy};
use helpdesk_core::store::BoxFuture;
use helpdesk_core::{EventKind, Notifier, Result, Ticket};
use tracing::info;

/// Logs notifications instead of sending them.
///
/// Selected when no SMTP host is configured.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier {
    policy: RecipientPolicy,
}

impl ConsoleNotifier {
    /// Create a console notifier.
    #[must_use]
    pub const fn new(policy: RecipientPolicy) -> Self {
        Self { policy }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify<'a>(&'a self, ticket: &'a Ticket, kind: EventKind) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let email = NotificationEmail::render(ticket, kind);
            for to in self.policy.recipients(ticket, kind) {
                info!(
                    to = %to,
                    protocol = %ticket.protocol,
                    status = ticket.status.as_str(),
                    subject = %email.subject,
                    "Notification email (development mode)"
                );
            }
            Ok(())
        })
    }
}
