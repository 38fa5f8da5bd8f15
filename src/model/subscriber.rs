//! # Subscriber identity and per-data-center version state.
//!
//! A [`Subscriber`] is a client interest registered on a connection. Its
//! identity tuple (`data_info_id`, `scope`, `assemble_type`,
//! `client_version`) forms the pushing key together with the connection
//! address; its version table records the highest snapshot acknowledged per
//! data center.
//!
//! ## Rules
//! - Clones share one version table, so a task carrying a subscriber clone
//!   advances the same state the next freshness check reads.
//! - Version operations are per-data-center point operations; the entry API
//!   of the underlying map makes each check-and-advance atomic.
//! - Advancement is monotonic: a record never moves backwards in either the
//!   push version or the fetch sequence.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;

/// Scope of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Entries from the subscriber's own zone.
    Zone,
    /// Entries from the subscriber's data center.
    DataCenter,
    /// Entries from every data center.
    Global,
}

/// How pushed data is assembled for the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssembleType {
    /// Subscriber-side view only.
    Sub,
    /// Publisher-side view only.
    Pub,
    /// Both views combined.
    All,
}

/// Protocol generation the client speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientVersion {
    /// Legacy single-cell protocol.
    V1,
    /// Multi-cell protocol.
    V2,
}

/// Highest snapshot a subscriber has acknowledged for one data center.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedVersion {
    /// Acknowledged push version.
    pub push_version: u64,
    /// Fetch sequence range of the acknowledged snapshot.
    pub fetch_seq_start: u64,
    /// End of the acknowledged fetch sequence range.
    pub fetch_seq_end: u64,
    /// Per-data-center entry versions delivered with the snapshot.
    pub entry_versions: HashMap<String, u64>,
}

/// A client interest registered on a connection.
///
/// Identity fields are immutable after construction. The version table is
/// shared across clones (`Arc`), so every task carrying this subscriber
/// observes and advances one state.
#[derive(Clone, Debug)]
pub struct Subscriber {
    /// Registration id, unique on the connection.
    pub register_id: String,
    /// Identity of the data set the subscriber wants.
    pub data_info_id: String,
    /// Subscription scope.
    pub scope: Scope,
    /// Assembly mode for pushed data.
    pub assemble_type: AssembleType,
    /// Protocol generation of the client.
    pub client_version: ClientVersion,
    /// Address pushes are delivered to.
    pub source_address: SocketAddr,

    // Keyed by data center name.
    received: Arc<DashMap<String, ReceivedVersion>>,
}

impl Subscriber {
    /// Creates a subscriber with an empty version table.
    pub fn new(
        register_id: impl Into<String>,
        data_info_id: impl Into<String>,
        scope: Scope,
        assemble_type: AssembleType,
        client_version: ClientVersion,
        source_address: SocketAddr,
    ) -> Self {
        Self {
            register_id: register_id.into(),
            data_info_id: data_info_id.into(),
            scope,
            assemble_type,
            client_version,
            source_address,
            received: Arc::new(DashMap::new()),
        }
    }

    /// Whether a snapshot starting at `fetch_seq_start` is still worth
    /// pushing to this subscriber.
    ///
    /// Returns `false` when a strictly newer snapshot has already been
    /// acknowledged for the data center, meaning another path delivered past
    /// this one.
    pub fn check_version(&self, data_center: &str, fetch_seq_start: u64) -> bool {
        self.received
            .get(data_center)
            .map(|cur| fetch_seq_start >= cur.fetch_seq_end)
            .unwrap_or(true)
    }

    /// Atomically advances the acknowledged state for `data_center`.
    ///
    /// The record advances iff the incoming snapshot is not behind the
    /// current one: `push_version >= current` and
    /// `fetch_seq_start >= current.fetch_seq_end`. Returns `false` without
    /// modifying anything when a concurrent update already moved past this
    /// snapshot.
    pub fn check_and_update_version(
        &self,
        data_center: &str,
        push_version: u64,
        entry_versions: &HashMap<String, u64>,
        fetch_seq_start: u64,
        fetch_seq_end: u64,
    ) -> bool {
        let next = ReceivedVersion {
            push_version,
            fetch_seq_start,
            fetch_seq_end,
            entry_versions: entry_versions.clone(),
        };
        match self.received.entry(data_center.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(next);
                true
            }
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let cur = slot.get();
                if push_version >= cur.push_version && fetch_seq_start >= cur.fetch_seq_end {
                    slot.insert(next);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Returns the highest acknowledged state for `data_center`, if any.
    pub fn received(&self, data_center: &str) -> Option<ReceivedVersion> {
        self.received.get(data_center).map(|r| r.clone())
    }

    /// The identity tuple that must agree across all subscribers of one
    /// push intent.
    pub(crate) fn identity_tuple(&self) -> (&str, Scope, AssembleType, ClientVersion) {
        (
            &self.data_info_id,
            self.scope,
            self.assemble_type,
            self.client_version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber() -> Subscriber {
        Subscriber::new(
            "reg-1",
            "svc.example",
            Scope::DataCenter,
            AssembleType::Sub,
            ClientVersion::V2,
            "127.0.0.1:9600".parse().unwrap(),
        )
    }

    #[test]
    fn check_version_passes_with_no_record() {
        let s = subscriber();
        assert!(s.check_version("A", 0));
    }

    #[test]
    fn check_version_rejects_older_snapshot() {
        let s = subscriber();
        assert!(s.check_and_update_version("A", 5, &HashMap::new(), 10, 12));
        // Start before the acknowledged end: a newer snapshot was delivered.
        assert!(!s.check_version("A", 11));
        assert!(s.check_version("A", 12));
    }

    #[test]
    fn update_is_monotonic() {
        let s = subscriber();
        assert!(s.check_and_update_version("A", 5, &HashMap::new(), 10, 12));
        // Behind on fetch sequence: refused.
        assert!(!s.check_and_update_version("A", 6, &HashMap::new(), 9, 9));
        // Behind on push version: refused.
        assert!(!s.check_and_update_version("A", 4, &HashMap::new(), 12, 13));
        // At or after on both: accepted.
        assert!(s.check_and_update_version("A", 5, &HashMap::new(), 12, 13));

        let rec = s.received("A").unwrap();
        assert_eq!(rec.push_version, 5);
        assert_eq!((rec.fetch_seq_start, rec.fetch_seq_end), (12, 13));
    }

    #[test]
    fn clones_share_version_state() {
        let s = subscriber();
        let clone = s.clone();
        assert!(clone.check_and_update_version("A", 1, &HashMap::new(), 3, 3));
        assert!(!s.check_version("A", 2));
    }

    #[test]
    fn data_centers_are_independent() {
        let s = subscriber();
        assert!(s.check_and_update_version("A", 9, &HashMap::new(), 50, 50));
        assert!(s.check_version("B", 0));
        assert!(s.received("B").is_none());
    }
}
