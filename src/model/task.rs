//! # Push task, coalescing key, and in-flight key.
//!
//! A [`PushTask`] is one push intent flowing through the core: created by a
//! producer, coalesced in the pending buffer, dispatched by the watchdog,
//! executed by the keyed dispatcher, finished by the transport callback.
//!
//! Two derived keys partition that flow:
//! - [`PendingKey`] the coalescing identity; intents with equal pending keys
//!   are the same conversation and only the freshest wins.
//! - [`PushingKey`] the in-flight identity; the dispatcher serializes on it
//!   so a destination never has two pushes executing in parallel.
//!
//! ## Rules
//! - `fetch_seq_start <= fetch_seq_end` (validated at construction).
//! - All subscribers of one task agree on the identity tuple that forms the
//!   pushing key (validated at construction, see [`PushTask::build`]).
//! - Freshness is the half-open order [`PushTask::is_after`]: overlapping
//!   ranges are not-after and conflict-report instead of replacing.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::TaskError;
use crate::model::{AssembleType, ClientVersion, Datum, Scope, Subscriber};

/// Process-wide counter for trace ids.
static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique trace identifier of a push task.
///
/// Retries keep the id of the task they retry; a replacement arriving through
/// the pending buffer carries a fresh one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(TASK_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push-{}", self.0)
    }
}

/// Producer-facing parameter record for
/// [`PushProcessor::fire_push`](crate::PushProcessor::fire_push).
#[derive(Clone, Debug)]
pub struct PushIntent {
    /// Bypass the debounce window and wake the watchdog immediately.
    pub no_delay: bool,
    /// Monotonic data version within the data center.
    pub push_version: u64,
    /// Destination data center of the snapshot.
    pub data_center: String,
    /// Client transport address (the coalescing scope).
    pub addr: SocketAddr,
    /// Subscribers on the connection interested in the entries.
    pub subscriber_map: HashMap<String, Subscriber>,
    /// Snapshot payload, keyed by data center.
    pub datum_map: HashMap<String, Datum>,
    /// Start of the fetch sequence window the snapshot came from.
    pub fetch_seq_start: u64,
    /// End of the fetch sequence window.
    pub fetch_seq_end: u64,
}

/// Coalescing identity: intents with equal pending keys replace each other.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PendingKey {
    /// Destination data center.
    pub data_center: String,
    /// Client transport address.
    pub addr: SocketAddr,
    /// Subscriber registration ids on the connection.
    pub subscriber_ids: BTreeSet<String>,
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pending({}, {}, {} subs)",
            self.data_center,
            self.addr,
            self.subscriber_ids.len()
        )
    }
}

/// In-flight identity: one logical push slot per destination interest.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PushingKey {
    /// Identity of the data set.
    pub data_info_id: String,
    /// Client transport address.
    pub addr: SocketAddr,
    /// Subscription scope.
    pub scope: Scope,
    /// Assembly mode.
    pub assemble_type: AssembleType,
    /// Client protocol generation.
    pub client_version: ClientVersion,
}

impl fmt::Display for PushingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pushing({}, {})", self.data_info_id, self.addr)
    }
}

/// One push intent with its debounce and retry bookkeeping.
///
/// The task is an owned value moved through the pipeline; the fields mutated
/// after construction (`expire_at`, `retry_count`) are only touched by the
/// current owner.
#[derive(Clone, Debug)]
pub struct PushTask {
    /// Trace identifier.
    pub id: TaskId,
    /// Creation time.
    pub created_at: Instant,
    /// Earliest time the task is eligible to dispatch.
    pub expire_at: Instant,
    /// Bypass the debounce window.
    pub no_delay: bool,
    /// Start of the fetch sequence window identifying the snapshot.
    pub fetch_seq_start: u64,
    /// End of the fetch sequence window.
    pub fetch_seq_end: u64,
    /// Destination data center.
    pub data_center: String,
    /// Monotonic data version within the data center.
    pub push_version: u64,
    /// Snapshot payload, keyed by data center.
    pub datum_map: HashMap<String, Datum>,
    /// Client transport address.
    pub addr: SocketAddr,
    /// Subscribers on the connection, keyed by registration id.
    pub subscriber_map: HashMap<String, Subscriber>,
    /// Retries consumed so far.
    pub retry_count: u32,

    // Representative for keying; identity-uniform with subscriber_map.
    pub(crate) subscriber: Subscriber,
}

impl PushTask {
    /// Builds a task from a producer intent, applying the debounce window.
    ///
    /// Validation is loud: an empty subscriber map, subscribers with mixed
    /// identity tuples, or an inverted fetch range are rejected with a typed
    /// [`TaskError`] instead of producing a task keyed off arbitrary state.
    pub fn build(intent: PushIntent, debounce: Duration) -> Result<Self, TaskError> {
        if intent.fetch_seq_start > intent.fetch_seq_end {
            return Err(TaskError::InvalidFetchRange {
                start: intent.fetch_seq_start,
                end: intent.fetch_seq_end,
            });
        }
        let representative = intent
            .subscriber_map
            .values()
            .next()
            .cloned()
            .ok_or(TaskError::NoSubscribers)?;
        for sub in intent.subscriber_map.values() {
            if sub.identity_tuple() != representative.identity_tuple() {
                return Err(TaskError::MixedSubscribers {
                    register_id: sub.register_id.clone(),
                });
            }
        }

        let now = Instant::now();
        Ok(Self {
            id: TaskId::next(),
            created_at: now,
            expire_at: now + debounce,
            no_delay: intent.no_delay,
            fetch_seq_start: intent.fetch_seq_start,
            fetch_seq_end: intent.fetch_seq_end,
            data_center: intent.data_center,
            push_version: intent.push_version,
            datum_map: intent.datum_map,
            addr: intent.addr,
            subscriber_map: intent.subscriber_map,
            retry_count: 0,
            subscriber: representative,
        })
    }

    /// Freshness order: this task strictly supersedes a snapshot that ended
    /// at `prev_fetch_seq_end`.
    ///
    /// Half-open on purpose: an overlapping range is not-after and triggers
    /// conflict reporting rather than replacement.
    #[inline]
    pub fn is_after(&self, prev_fetch_seq_end: u64) -> bool {
        self.fetch_seq_start >= prev_fetch_seq_end
    }

    /// Moves the dispatch eligibility `interval` into the future.
    pub fn expire_after(&mut self, interval: Duration) {
        self.expire_at = Instant::now() + interval;
    }

    /// The coalescing identity of this task.
    pub fn pending_key(&self) -> PendingKey {
        PendingKey {
            data_center: self.data_center.clone(),
            addr: self.addr,
            subscriber_ids: self.subscriber_map.keys().cloned().collect(),
        }
    }

    /// The in-flight identity of this task.
    pub fn pushing_key(&self) -> PushingKey {
        PushingKey {
            data_info_id: self.subscriber.data_info_id.clone(),
            addr: self.addr,
            scope: self.subscriber.scope,
            assemble_type: self.subscriber.assemble_type,
            client_version: self.subscriber.client_version,
        }
    }
}
