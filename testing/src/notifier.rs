//! Notifier double.

use helpdesk_core::store::BoxFuture;
use helpdesk_core::{EventKind, HelpdeskError, Notifier, Protocol, Result, Ticket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Records every notification it is asked to send.
///
/// Calls are recorded even when the notifier is set to fail, so tests can
/// check that delivery was attempted.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(Protocol, EventKind)>>,
    failing: AtomicBool,
    recorded: Notify,
}

impl RecordingNotifier {
    /// Create a notifier that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier whose every delivery fails.
    #[must_use]
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    /// Toggle failure.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of the recorded calls, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(Protocol, EventKind)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded calls of `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.calls().iter().filter(|(_, k)| *k == kind).count()
    }

    /// Wait until at least `n` calls were recorded or `timeout` elapsed.
    ///
    /// Returns the calls recorded so far.
    pub async fn wait_for_calls(&self, n: usize, timeout: Duration) -> Vec<(Protocol, EventKind)> {
        let _ = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.recorded.notified();
                if self.calls().len() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await;
        self.calls()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, ticket: &'a Ticket, kind: EventKind) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((ticket.protocol.clone(), kind));
            self.recorded.notify_waiters();

            if self.failing.load(Ordering::SeqCst) {
                return Err(HelpdeskError::NotificationDelivery(
                    "recording notifier set to fail".to_string(),
                ));
            }
            Ok(())
        })
    }
}
