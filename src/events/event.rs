//! # Runtime events emitted by the push dispatch core.
//!
//! Every decision the core takes about a task is published as a
//! [`PushEvent`]: coalescing conflicts, watchdog drains, dispatch rejections,
//! freshness skips, stuck evictions, transport outcomes, retry scheduling.
//! Observers consume these for logging and metrics; nothing in the core
//! writes to a log directly.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so observers can order events delivered out-of-band
//! through async channels.
//!
//! ## Event flow examples
//!
//! ### Debounced happy path
//! ```text
//! fire_push
//!   → [debounce window]
//!   → PendingDrained
//!   → Pushing
//!   → PushSucceeded
//! ```
//!
//! ### Transient transport failure
//! ```text
//! Pushing
//!   → PushFailed (channel still connected)
//!   → RetryScheduled
//!   → [back-off]
//!   → Pushing
//!   → PushSucceeded
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::model::TaskId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Reporting severity of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected traffic: accepted work, successful pushes, bookkeeping.
    Info,
    /// Suspicious but self-healing: skips, evictions, closed channels.
    Warn,
    /// Dropped work or failed collaborators.
    Error,
}

/// Classification of push dispatch events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Pending buffer ===
    /// An incoming intent was not strictly newer than the pending entry for
    /// its key and was rejected.
    ConflictPending,
    /// A producer intent failed construction-time validation.
    InvalidIntent,

    // === Watchdog / dispatcher ===
    /// The watchdog transferred a batch of ready tasks to the dispatcher.
    PendingDrained,
    /// The dispatcher rejected a submission (lane full or closed).
    SubmitRejected,

    // === Freshness gate ===
    /// A subscriber had already acknowledged a newer snapshot; the task was
    /// skipped.
    StaleSkipped,
    /// A prior in-flight push was at least as new as the task; skipped.
    NotNewerSkipped,
    /// A prior in-flight push exceeded the stuck threshold and was
    /// force-evicted.
    StuckEvicted,

    // === Transport ===
    /// A payload was handed to the transport.
    Pushing,
    /// The transport callback reported success.
    PushSucceeded,
    /// The transport callback reported a timeout.
    PushTimeout,
    /// The transport callback reported a non-timeout failure.
    PushFailed,
    /// The transport callback found the channel disconnected; no retry.
    ChannelClosed,
    /// A push succeeded but a subscriber's version did not advance (another
    /// path already moved past this snapshot).
    VersionSkipped,

    // === Retry ===
    /// A task was re-queued with back-off.
    RetryScheduled,
    /// A task exhausted its retry budget and was dropped.
    RetryExhausted,

    // === Observer plumbing ===
    /// An observer dropped an event (queue full or worker closed).
    ObserverOverflow,
    /// An observer panicked during event processing.
    ObserverPanicked,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::ConflictPending => "conflict_pending",
            EventKind::InvalidIntent => "invalid_intent",
            EventKind::PendingDrained => "pending_drained",
            EventKind::SubmitRejected => "submit_rejected",
            EventKind::StaleSkipped => "stale_skipped",
            EventKind::NotNewerSkipped => "not_newer_skipped",
            EventKind::StuckEvicted => "stuck_evicted",
            EventKind::Pushing => "pushing",
            EventKind::PushSucceeded => "push_succeeded",
            EventKind::PushTimeout => "push_timeout",
            EventKind::PushFailed => "push_failed",
            EventKind::ChannelClosed => "channel_closed",
            EventKind::VersionSkipped => "version_skipped",
            EventKind::RetryScheduled => "retry_scheduled",
            EventKind::RetryExhausted => "retry_exhausted",
            EventKind::ObserverOverflow => "observer_overflow",
            EventKind::ObserverPanicked => "observer_panicked",
        }
    }

    /// Reporting severity of this kind.
    pub fn severity(&self) -> Severity {
        match self {
            EventKind::ConflictPending
            | EventKind::PendingDrained
            | EventKind::Pushing
            | EventKind::PushSucceeded
            | EventKind::RetryScheduled
            | EventKind::RetryExhausted => Severity::Info,

            EventKind::StaleSkipped
            | EventKind::NotNewerSkipped
            | EventKind::StuckEvicted
            | EventKind::ChannelClosed
            | EventKind::VersionSkipped
            | EventKind::ObserverOverflow => Severity::Warn,

            EventKind::InvalidIntent
            | EventKind::SubmitRejected
            | EventKind::PushTimeout
            | EventKind::PushFailed
            | EventKind::ObserverPanicked => Severity::Error,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Runtime event with optional metadata.
///
/// ## Fields
/// - `seq`: unique sequence number for ordering (monotonically increasing)
/// - `at`: wall-clock timestamp (may go backwards, use for logging only)
/// - `kind`: event classification
/// - `task`, `key`, `reason`, `error`, `retry`, `delay`, `span`, `count`,
///   `cleaned`: optional metadata
#[derive(Clone, Debug)]
pub struct PushEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Trace id of the task, if applicable.
    pub task: Option<TaskId>,
    /// Rendered pending or pushing key, if applicable.
    pub key: Option<String>,
    /// Short machine-readable cause (`"waiting"`, `"callback_err"`).
    pub reason: Option<&'static str>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Retry count after the event, if relevant.
    pub retry: Option<u32>,
    /// Back-off delay before the next attempt, if relevant.
    pub delay: Option<Duration>,
    /// Time between transport handoff and callback, if relevant.
    pub span: Option<Duration>,
    /// Batch size, if relevant.
    pub count: Option<usize>,
    /// Whether the in-flight entry was still present at cleanup.
    pub cleaned: Option<bool>,
}

impl PushEvent {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            key: None,
            reason: None,
            error: None,
            retry: None,
            delay: None,
            span: None,
            count: None,
            cleaned: None,
        }
    }

    /// Attaches the task trace id.
    pub fn with_task(mut self, id: TaskId) -> Self {
        self.task = Some(id);
        self
    }

    /// Attaches a rendered key.
    pub fn with_key(mut self, key: impl ToString) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Attaches a short machine-readable cause.
    pub fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches the retry count.
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Attaches a back-off delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attaches the handoff-to-callback span.
    pub fn with_span(mut self, span: Duration) -> Self {
        self.span = Some(span);
        self
    }

    /// Attaches a batch size.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches the cleanup outcome.
    pub fn with_cleaned(mut self, cleaned: bool) -> Self {
        self.cleaned = Some(cleaned);
        self
    }

    /// Creates an observer overflow event.
    pub fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        PushEvent::now(EventKind::ObserverOverflow)
            .with_reason(reason)
            .with_error(format!("observer={observer}"))
    }

    /// Creates an observer panic event.
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        PushEvent::now(EventKind::ObserverPanicked)
            .with_error(format!("observer={observer} panic={info}"))
    }

    /// Whether this event is observer plumbing (never re-reported on
    /// overflow, to avoid event storms).
    pub(crate) fn is_observer_plumbing(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ObserverOverflow | EventKind::ObserverPanicked
        )
    }
}
