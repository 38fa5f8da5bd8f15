//! # Pending buffer: debounced coalescing of push intents.
//!
//! Maps each [`PendingKey`] to the freshest task awaiting dispatch. Rapidly
//! arriving intents for the same conversation collapse into one entry; only
//! a strictly newer snapshot may replace the current one.
//!
//! ## Rules
//! - Fast path is a lock-free insert-if-absent; producers only contend on
//!   the mutex when their key already has an entry.
//! - A replacement **inherits the previous expiry**. A stream of rapid
//!   intents must not postpone dispatch indefinitely by resetting the
//!   debounce window on every arrival.
//! - A task that is not strictly newer than the pending entry is rejected
//!   and handed back for conflict reporting.
//! - `drain_ready` removes every entry that is `no_delay` or past its
//!   expiry, under the same mutex, and releases it before dispatch.

use std::sync::{Mutex, MutexGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::model::{PendingKey, PushTask};

/// Outcome of offering a task to the buffer.
pub(crate) enum Admission {
    /// No entry existed for the key; the task is now pending.
    Fresh,
    /// The task superseded an older pending entry, inheriting its expiry.
    Replaced,
    /// The task was not strictly newer than the pending entry.
    ///
    /// Carries the rejected task back to the caller together with the end of
    /// the winning entry's fetch range, for conflict reporting.
    Rejected {
        task: PushTask,
        pending_seq_end: u64,
    },
}

/// Coalescing buffer of tasks awaiting dispatch.
pub(crate) struct PendingBuffer {
    tasks: DashMap<PendingKey, PushTask>,
    // Serializes read-modify-write: the offer slow path and drain_ready.
    lock: Mutex<()>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            lock: Mutex::new(()),
        }
    }

    /// Offers a task for its pending key.
    ///
    /// Fast path: insert-if-absent without touching the mutex. Slow path:
    /// under the mutex, re-read the entry and replace it only when the task
    /// is strictly newer, inheriting the entry's expiry.
    pub fn offer(&self, mut task: PushTask) -> Admission {
        let key = task.pending_key();

        if let Entry::Vacant(slot) = self.tasks.entry(key.clone()) {
            slot.insert(task);
            return Admission::Fresh;
        }

        let _guard = self.guard();
        match self.tasks.entry(key) {
            Entry::Vacant(slot) => {
                // Drained between the fast path and here.
                slot.insert(task);
                Admission::Fresh
            }
            Entry::Occupied(mut slot) => {
                let prev = slot.get();
                if task.is_after(prev.fetch_seq_end) {
                    task.expire_at = prev.expire_at;
                    slot.insert(task);
                    Admission::Replaced
                } else {
                    Admission::Rejected {
                        pending_seq_end: prev.fetch_seq_end,
                        task,
                    }
                }
            }
        }
    }

    /// Transfer-and-merge: removes and returns every task that is `no_delay`
    /// or whose expiry has passed.
    pub fn drain_ready(&self, now: Instant) -> Vec<PushTask> {
        let _guard = self.guard();

        let ready_keys: Vec<PendingKey> = self
            .tasks
            .iter()
            .filter(|entry| entry.no_delay || entry.expire_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut ready = Vec::with_capacity(ready_keys.len());
        for key in ready_keys {
            if let Some((_, task)) = self.tasks.remove(&key) {
                ready.push(task);
            }
        }
        ready
    }

    /// Number of tasks currently pending.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    // A poisoned pending lock would only mean a panic mid-bookkeeping; the
    // map itself is still coherent, so recover the guard.
    fn guard(&self) -> MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
