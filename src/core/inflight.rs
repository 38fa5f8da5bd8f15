//! # In-flight registry: one push slot per pushing key.
//!
//! Tracks the push currently awaiting its transport callback for each
//! [`PushingKey`]. The registry stores a value snapshot of what the
//! freshness and stuck checks need (trace id, fetch range, handoff time),
//! not the task itself; the callback carries the key and looks the entry up.
//!
//! ## Rules
//! - `install` is a plain overwrite: a straggler entry never blocks a newer
//!   dispatch that already passed the gate.
//! - `complete` removes only when the stored trace id matches, so a late
//!   callback cannot evict an entry installed by a newer task.
//! - `evict` is unconditional; used when the stuck threshold is exceeded.

use dashmap::DashMap;
use tokio::time::Instant;

use crate::model::{PushingKey, TaskId};

/// Snapshot of the push occupying a slot.
#[derive(Clone, Copy, Debug)]
pub(crate) struct InFlightEntry {
    /// Trace id of the task that installed the entry.
    pub task_id: TaskId,
    /// Start of the in-flight snapshot's fetch range.
    pub fetch_seq_start: u64,
    /// End of the in-flight snapshot's fetch range.
    pub fetch_seq_end: u64,
    /// When the payload was handed to the transport.
    pub pushed_at: Instant,
}

/// Registry of pushes awaiting their transport callback.
pub(crate) struct InFlightTable {
    slots: DashMap<PushingKey, InFlightEntry>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Returns the entry occupying `key`, if any.
    pub fn get(&self, key: &PushingKey) -> Option<InFlightEntry> {
        self.slots.get(key).map(|e| *e)
    }

    /// Installs an entry, overwriting any straggler.
    pub fn install(&self, key: PushingKey, entry: InFlightEntry) {
        self.slots.insert(key, entry);
    }

    /// Removes the entry iff it is still the one installed by `task_id`.
    ///
    /// Returns whether an entry was removed.
    pub fn complete(&self, key: &PushingKey, task_id: TaskId) -> bool {
        self.slots
            .remove_if(key, |_, entry| entry.task_id == task_id)
            .is_some()
    }

    /// Unconditionally removes the entry for `key` (stuck eviction).
    pub fn evict(&self, key: &PushingKey) -> Option<InFlightEntry> {
        self.slots.remove(key).map(|(_, entry)| entry)
    }

    /// Number of pushes currently in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
