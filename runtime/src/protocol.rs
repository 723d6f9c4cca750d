//! Protocol generation.
//!
//! Protocols are `TICKET-` followed by the creation time as `%Y%m%d%H%M%S`,
//! rendered at a fixed UTC offset. Within one process the generator never
//! issues the same second twice: each call yields
//! `max(now, last_issued + 1s)`. A restarted process resumes after the
//! newest stored protocol via [`ProtocolGenerator::resume_after`]. Across
//! processes the store's unique constraint reports a conflict and the caller
//! asks for another protocol.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use helpdesk_core::environment::Clock;
use helpdesk_core::ticket::PROTOCOL_PREFIX;
use helpdesk_core::Protocol;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

const PROTOCOL_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Default offset: UTC-03:00.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// Issues unique, time-ordered protocols.
pub struct ProtocolGenerator {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    last_issued: AtomicI64,
}

impl ProtocolGenerator {
    /// Create a generator rendering timestamps at `utc_offset_minutes`.
    ///
    /// Offsets outside ±24h fall back to UTC.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(utc_offset_minutes, "Invalid protocol UTC offset, using UTC");
                Utc.fix()
            });

        Self {
            clock,
            offset,
            last_issued: AtomicI64::new(i64::MIN),
        }
    }

    /// The next protocol.
    pub fn next(&self) -> Protocol {
        let now = self.clock.now().timestamp();

        let previous = self
            .last_issued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        let issued = now.max(previous.saturating_add(1));

        let at = DateTime::from_timestamp(issued, 0).unwrap_or_else(|| self.clock.now());
        Protocol::new(format!(
            "{PROTOCOL_PREFIX}{}",
            at.with_timezone(&self.offset).format(PROTOCOL_TIME_FORMAT)
        ))
    }

    /// Never issue `protocol` or anything before it.
    ///
    /// Protocols that were not rendered by this format are ignored.
    pub fn resume_after(&self, protocol: &Protocol) {
        let Some(issued) = self.timestamp_of(protocol) else {
            tracing::debug!(%protocol, "Not a generated protocol, nothing to resume from");
            return;
        };
        self.last_issued.fetch_max(issued, Ordering::SeqCst);
    }

    fn timestamp_of(&self, protocol: &Protocol) -> Option<i64> {
        let digits = protocol.as_str().strip_prefix(PROTOCOL_PREFIX)?;
        let local = NaiveDateTime::parse_from_str(digits, PROTOCOL_TIME_FORMAT).ok()?;
        local
            .and_local_timezone(self.offset)
            .single()
            .map(|at| at.timestamp())
    }
}

impl std::fmt::Debug for ProtocolGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolGenerator")
            .field("offset", &self.offset)
            .field("last_issued", &self.last_issued.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
