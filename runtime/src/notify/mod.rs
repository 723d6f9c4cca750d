//! Notification delivery.
//!
//! [`NotificationDispatcher`] is the only way the services reach a
//! [`Notifier`]: every notification runs on its own task after the write that
//! caused it has committed, and a failure is logged and counted, never
//! returned.

mod console;
mod smtp;

pub use console::ConsoleNotifier;
pub use smtp::{SmtpNotifier, SmtpSettings};

use crate::metrics::NotificationMetrics;
use helpdesk_core::{EventKind, Notifier, Ticket};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Who receives which notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientPolicy {
    /// Support distribution list.
    pub support_addresses: Vec<String>,
    /// Send opening notifications to the customer.
    pub open_to_customer: bool,
    /// Send opening notifications to the support list.
    pub open_to_support: bool,
    /// Send update notifications to the customer.
    pub update_to_customer: bool,
    /// Send update notifications to the support list.
    pub update_to_support: bool,
}

impl Default for RecipientPolicy {
    fn default() -> Self {
        Self {
            support_addresses: Vec::new(),
            open_to_customer: true,
            open_to_support: true,
            update_to_customer: true,
            update_to_support: false,
        }
    }
}

impl RecipientPolicy {
    /// Default toggles with the given support list.
    #[must_use]
    pub fn with_support(support_addresses: Vec<String>) -> Self {
        Self {
            support_addresses,
            ..Self::default()
        }
    }

    /// Recipients of a `kind` notification about `ticket`, without duplicates.
    #[must_use]
    pub fn recipients(&self, ticket: &Ticket, kind: EventKind) -> Vec<String> {
        let (to_customer, to_support) = match kind {
            EventKind::Open => (self.open_to_customer, self.open_to_support),
            EventKind::Update => (self.update_to_customer, self.update_to_support),
        };

        let mut recipients: Vec<String> = Vec::new();
        if to_customer {
            recipients.push(ticket.customer_email.clone());
        }
        if to_support {
            recipients.extend(self.support_addresses.iter().cloned());
        }

        let mut seen = std::collections::HashSet::new();
        recipients.retain(|r| !r.trim().is_empty() && seen.insert(r.to_ascii_lowercase()));
        recipients
    }
}

/// Subject and HTML body of a notification email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEmail {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

impl NotificationEmail {
    /// Render the email for `ticket`.
    #[must_use]
    pub fn render(ticket: &Ticket, kind: EventKind) -> Self {
        let (subject, heading, lead) = match kind {
            EventKind::Open => (
                format!("Ticket opened: {}", ticket.protocol),
                "Your ticket has been opened",
                "We received your request and will get back to you shortly.",
            ),
            EventKind::Update => (
                format!("Ticket updated: {}", ticket.protocol),
                "Your ticket has been updated",
                "The status of your request has changed.",
            ),
        };

        let name = escape_html(&ticket.customer_name);
        let protocol = escape_html(ticket.protocol.as_str());
        let status = ticket.status.label();
        let sector = escape_html(&ticket.sector);

        let html_body = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{heading}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">{heading}</h2>
        <p>Hello {name},</p>
        <p>{lead}</p>
        <table style="margin: 20px 0;">
            <tr><td><strong>Protocol</strong></td><td>{protocol}</td></tr>
            <tr><td><strong>Sector</strong></td><td>{sector}</td></tr>
            <tr><td><strong>Status</strong></td><td>{status}</td></tr>
        </table>
        <p style="color: #666; font-size: 14px;">
            Keep your protocol to follow the conversation with our support team.
        </p>
    </div>
</body>
</html>
            "#
        );

        Self { subject, html_body }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Fire-and-forget front of a [`Notifier`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    /// Wrap a notifier.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Deliver on a background task.
    ///
    /// The returned handle never yields an error; callers may drop it.
    pub fn dispatch(&self, ticket: Ticket, kind: EventKind) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            match notifier.notify(&ticket, kind).await {
                Ok(()) => {
                    NotificationMetrics::record_sent(kind.as_str());
                    tracing::debug!(
                        protocol = %ticket.protocol,
                        kind = kind.as_str(),
                        "Notification delivered"
                    );
                },
                Err(error) => {
                    NotificationMetrics::record_failed(kind.as_str());
                    tracing::warn!(
                        protocol = %ticket.protocol,
                        kind = kind.as_str(),
                        error = %error,
                        "Notification delivery failed"
                    );
                },
            }
        })
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}
