//! # Push dispatch configuration.
//!
//! Provides [`PushConfig`] centralized settings for the push processor.
//!
//! The config is a plain value captured at
//! [`PushProcessor::spawn`](crate::PushProcessor::spawn). The stop-push
//! switch is the one dynamic knob and lives on the processor as an atomic
//! flag, not here.
//!
//! ## Sentinel values
//! - `dispatch_workers = 0` → clamped to 1 (a keyed pool needs a lane)
//! - `dispatch_queue_capacity = 0` → clamped to 1
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::{JitterPolicy, RetryBackoff};

/// Configuration for the push processor.
///
/// Defines:
/// - **Dispatcher sizing**: worker count and per-lane queue capacity
/// - **Debounce**: initial delay applied to fresh tasks so nearby successors
///   can replace them before dispatch
/// - **Retry**: budget and linear back-off for transient transport failures
/// - **Stuck detection**: exchange timeout, doubled for the stuck threshold
/// - **Event system**: bus capacity for event delivery
#[derive(Clone, Debug)]
pub struct PushConfig {
    /// Number of dispatcher workers (pushing keys are hashed onto lanes).
    pub dispatch_workers: usize,

    /// Capacity of each dispatcher lane queue.
    ///
    /// A full lane rejects submission; the dropped task is recreated by the
    /// next producer intent for the same pending key.
    pub dispatch_queue_capacity: usize,

    /// Debounce window applied to a freshly fired task.
    ///
    /// The task becomes eligible for dispatch `debounce` after creation,
    /// unless it carries `no_delay`.
    pub debounce: Duration,

    /// Client exchange timeout.
    ///
    /// A prior in-flight push older than twice this value is declared stuck
    /// and force-evicted when a newer task arrives for the same pushing key.
    pub exchange_timeout: Duration,

    /// Maximum number of retries per task identity.
    ///
    /// A task is dispatched at most `retry_times + 1` times.
    pub retry_times: u32,

    /// Back-off before the first retry.
    pub retry_first_delay: Duration,

    /// Back-off increment added per further retry.
    pub retry_increment_delay: Duration,

    /// Jitter applied on top of the linear back-off.
    ///
    /// Defaults to [`JitterPolicy::None`] so retry timing is exact.
    pub retry_jitter: JitterPolicy,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Observers that lag behind more than `bus_capacity` events receive
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Initial state of the stop-push switch.
    ///
    /// Toggle at runtime via
    /// [`PushProcessor::set_stop_push`](crate::PushProcessor::set_stop_push).
    pub stop_push: bool,
}

impl PushConfig {
    /// Threshold after which a prior in-flight push counts as stuck.
    ///
    /// Twice the exchange timeout, measured from transport handoff.
    #[inline]
    pub fn stuck_threshold(&self) -> Duration {
        self.exchange_timeout * 2
    }

    /// Builds the retry back-off policy from the configured delays.
    #[inline]
    pub fn retry_backoff(&self) -> RetryBackoff {
        RetryBackoff {
            first: self.retry_first_delay,
            increment: self.retry_increment_delay,
            jitter: self.retry_jitter,
        }
    }

    /// Returns the worker count clamped to a minimum of 1.
    #[inline]
    pub fn workers_clamped(&self) -> usize {
        self.dispatch_workers.max(1)
    }

    /// Returns the per-lane queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.dispatch_queue_capacity.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PushConfig {
    /// Default configuration:
    ///
    /// - `dispatch_workers = 8`, `dispatch_queue_capacity = 1024`
    /// - `debounce = 500ms`
    /// - `exchange_timeout = 2s` (stuck threshold 4s)
    /// - `retry_times = 3`, back-off `500ms + 500ms × (n − 1)`, no jitter
    /// - `bus_capacity = 1024`
    /// - `stop_push = false`
    fn default() -> Self {
        Self {
            dispatch_workers: 8,
            dispatch_queue_capacity: 1024,
            debounce: Duration::from_millis(500),
            exchange_timeout: Duration::from_secs(2),
            retry_times: 3,
            retry_first_delay: Duration::from_millis(500),
            retry_increment_delay: Duration::from_millis(500),
            retry_jitter: JitterPolicy::None,
            bus_capacity: 1024,
            stop_push: false,
        }
    }
}
