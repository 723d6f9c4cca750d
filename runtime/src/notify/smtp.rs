//! SMTP notifier using Lettre.

use super::{NotificationEmail, RecipientPolicy};
use futures::future::join_all;
use helpdesk_core::store::BoxFuture;
use helpdesk_core::{EventKind, HelpdeskError, Notifier, Result, Ticket};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    /// SMTP server address (e.g., "smtp.gmail.com").
    pub host: String,
    /// SMTP server port (usually 587 for STARTTLS).
    pub port: u16,
    /// Authentication username.
    pub username: Option<String>,
    /// Authentication password.
    pub password: Option<String>,
    /// Sender email address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
    /// Upgrade the connection with STARTTLS. Disable only for local relays.
    pub starttls: bool,
}

/// Sends notification emails over SMTP.
///
/// One message is sent per recipient. Every failed recipient is logged; the
/// call fails if any recipient failed.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    policy: RecipientPolicy,
}

impl SmtpNotifier {
    /// Create a new SMTP notifier.
    ///
    /// # Errors
    ///
    /// Returns [`HelpdeskError::NotificationDelivery`] if the relay or sender
    /// address is invalid.
    pub fn new(settings: SmtpSettings, policy: RecipientPolicy) -> Result<Self> {
        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| HelpdeskError::NotificationDelivery(format!("SMTP relay error: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        let builder = builder.port(settings.port);
        let transport = match (settings.username, settings.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username, password)).build()
            },
            _ => builder.build(),
        };

        let from = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse::<Mailbox>()
            .map_err(|e| HelpdeskError::NotificationDelivery(format!("Invalid from address: {e}")))?;

        Ok(Self {
            transport,
            from,
            policy,
        })
    }

    async fn send_one(&self, to: &str, email: &NotificationEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| HelpdeskError::NotificationDelivery(format!("Invalid to address {to}: {e}")))?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| HelpdeskError::NotificationDelivery(format!("Failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| HelpdeskError::NotificationDelivery(format!("Failed to send email to {to}: {e}")))
    }
}

impl Notifier for SmtpNotifier {
    fn notify<'a>(&'a self, ticket: &'a Ticket, kind: EventKind) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let recipients = self.policy.recipients(ticket, kind);
            let email = NotificationEmail::render(ticket, kind);

            let results = join_all(recipients.iter().map(|to| self.send_one(to, &email))).await;

            let failures: Vec<String> = results
                .into_iter()
                .filter_map(|result| result.err())
                .map(|error| {
                    tracing::warn!(protocol = %ticket.protocol, error = %error, "Email recipient failed");
                    error.to_string()
                })
                .collect();

            if failures.is_empty() {
                Ok(())
            } else {
                Err(HelpdeskError::NotificationDelivery(format!(
                    "{} of {} recipients failed",
                    failures.len(),
                    recipients.len()
                )))
            }
        })
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            from_email: "noreply@helpdesk.test".to_string(),
            from_name: "Helpdesk".to_string(),
            starttls: false,
        }
    }

    #[test]
    fn test_builds_plain_transport() {
        assert!(SmtpNotifier::new(settings(), RecipientPolicy::default()).is_ok());
    }

    #[test]
    fn test_rejects_invalid_sender() {
        let mut bad = settings();
        bad.from_email = "not an address".to_string();

        let err = SmtpNotifier::new(bad, RecipientPolicy::default()).unwrap_err();
        assert!(matches!(err, HelpdeskError::NotificationDelivery(_)));
    }
}
