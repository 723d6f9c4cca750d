//! Prometheus metrics for the helpdesk services.
//!
//! Counters cover ticket lifecycle, chat traffic and notification delivery;
//! one gauge tracks open chat connections. Names are dotted; the Prometheus
//! exporter renders them with underscores.
//!
//! # Example
//!
//! ```rust,no_run
//! use helpdesk_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let _scrape = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge};

/// Tickets opened.
pub const TICKETS_OPENED: &str = "helpdesk.tickets.opened";
/// Status changes committed.
pub const TICKETS_STATUS_CHANGED: &str = "helpdesk.tickets.status_changed";
/// Internal comments committed.
pub const TICKETS_COMMENTS: &str = "helpdesk.tickets.comments";
/// Chat messages persisted and broadcast.
pub const CHAT_MESSAGES: &str = "helpdesk.chat.messages";
/// Room joins.
pub const CHAT_JOINS: &str = "helpdesk.chat.joins";
/// Open realtime connections.
pub const CHAT_CONNECTIONS: &str = "helpdesk.chat.connections";
/// Notifications delivered.
pub const NOTIFICATIONS_SENT: &str = "helpdesk.notifications.sent";
/// Notifications that failed.
pub const NOTIFICATIONS_FAILED: &str = "helpdesk.notifications.failed";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
///
/// Installs the global recorder; the web layer serves [`render`](Self::render)
/// on the metrics address.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address the scrape endpoint is served on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint is served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the recorder cannot be installed for a reason other
    /// than one already being installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                register_metrics();
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - scrape at http://{}/metrics",
                    self.addr
                );
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(TICKETS_OPENED, "Total number of tickets opened");
    describe_counter!(TICKETS_STATUS_CHANGED, "Total number of ticket status changes");
    describe_counter!(TICKETS_COMMENTS, "Total number of internal comments");
    describe_counter!(CHAT_MESSAGES, "Total number of chat messages");
    describe_counter!(CHAT_JOINS, "Total number of chat room joins");
    describe_gauge!(CHAT_CONNECTIONS, "Currently open realtime connections");
    describe_counter!(NOTIFICATIONS_SENT, "Total number of notifications delivered");
    describe_counter!(NOTIFICATIONS_FAILED, "Total number of failed notifications");
}

/// Ticket lifecycle metrics recorder.
pub struct TicketMetrics;

impl TicketMetrics {
    /// Record a ticket opened.
    pub fn record_opened() {
        counter!(TICKETS_OPENED).increment(1);
    }

    /// Record a committed status change.
    pub fn record_status_change(to: &'static str) {
        counter!(TICKETS_STATUS_CHANGED, "to" => to).increment(1);
    }

    /// Record a committed comment.
    pub fn record_comment() {
        counter!(TICKETS_COMMENTS).increment(1);
    }
}

/// Chat metrics recorder.
pub struct ChatMetrics;

impl ChatMetrics {
    /// Record a chat message.
    pub fn record_message() {
        counter!(CHAT_MESSAGES).increment(1);
    }

    /// Record a join.
    pub fn record_join() {
        counter!(CHAT_JOINS).increment(1);
    }

    /// Record a connection opening.
    pub fn connection_opened() {
        gauge!(CHAT_CONNECTIONS).increment(1.0);
    }

    /// Record a connection closing.
    pub fn connection_closed() {
        gauge!(CHAT_CONNECTIONS).decrement(1.0);
    }
}

/// Notification metrics recorder.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a delivered notification.
    pub fn record_sent(kind: &'static str) {
        counter!(NOTIFICATIONS_SENT, "kind" => kind).increment(1);
    }

    /// Record a failed notification.
    pub fn record_failed(kind: &'static str) {
        counter!(NOTIFICATIONS_FAILED, "kind" => kind).increment(1);
    }
}
