//! # Data-center-scoped data snapshots.
//!
//! A [`Datum`] is the snapshot of entries backing one `data_info_id` within
//! one data center. Push intents carry a map of data center name to `Datum`;
//! the merge/encode seam turns that map into a wire payload.

use std::collections::HashMap;

/// One published entry inside a [`Datum`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataEntry {
    /// Registration id of the publisher that produced the entry.
    pub register_id: String,
    /// Opaque entry body.
    pub payload: Vec<u8>,
}

/// Snapshot of the entries backing a `data_info_id` in one data center.
///
/// The same `data_info_id` can have distinct snapshots per data center, each
/// with its own monotonic `version`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datum {
    /// Identity of the data set.
    pub data_info_id: String,
    /// Data center this snapshot came from.
    pub data_center: String,
    /// Monotonic snapshot version within the data center.
    pub version: u64,
    /// Entries of the snapshot.
    pub entries: Vec<DataEntry>,
}

impl Datum {
    /// Creates an empty snapshot at the given version.
    pub fn new(
        data_info_id: impl Into<String>,
        data_center: impl Into<String>,
        version: u64,
    ) -> Self {
        Self {
            data_info_id: data_info_id.into(),
            data_center: data_center.into(),
            version,
            entries: Vec::new(),
        }
    }
}

/// Collects the per-data-center version map from a datum map.
///
/// This is the version vector delivered to subscribers when a push succeeds.
pub fn versions(datum_map: &HashMap<String, Datum>) -> HashMap<String, u64> {
    datum_map
        .iter()
        .map(|(dc, datum)| (dc.clone(), datum.version))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_collects_per_data_center() {
        let mut map = HashMap::new();
        map.insert("A".to_string(), Datum::new("svc", "A", 7));
        map.insert("B".to_string(), Datum::new("svc", "B", 3));

        let v = versions(&map);
        assert_eq!(v.get("A"), Some(&7));
        assert_eq!(v.get("B"), Some(&3));
    }
}
