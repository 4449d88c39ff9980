//! Snapshot-scoped record collections.

use dashmap::DashMap;
use std::sync::Arc;

use crate::store::{SnapshotId, StoreResult};

/// Anything holding data for one snapshot that must go when the snapshot goes.
pub trait SnapshotScoped: Send + Sync {
    /// Collection name used in logs.
    fn name(&self) -> &'static str;

    /// Remove everything belonging to `snapshot`, returning the number of items removed.
    fn purge(&self, snapshot: SnapshotId) -> StoreResult<usize>;
}

/// A thread-safe map of records keyed by `(snapshot-id, id)`.
#[derive(Debug)]
pub struct Collection<T> {
    name: &'static str,
    records: DashMap<(SnapshotId, String), Arc<T>>,
}

impl<T> Collection<T> {
    /// Create a new empty collection.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            records: DashMap::new(),
        }
    }

    /// Insert or overwrite a record.
    pub fn insert(&self, snapshot: SnapshotId, id: impl Into<String>, record: T) -> Arc<T> {
        let record = Arc::new(record);
        self.records.insert((snapshot, id.into()), Arc::clone(&record));
        record
    }

    pub fn get(&self, snapshot: SnapshotId, id: &str) -> Option<Arc<T>> {
        self.records
            .get(&(snapshot, id.to_string()))
            .map(|r| Arc::clone(r.value()))
    }

    /// First record of `snapshot` satisfying `predicate`.
    pub fn find(&self, snapshot: SnapshotId, predicate: impl Fn(&T) -> bool) -> Option<Arc<T>> {
        self.records
            .iter()
            .find(|r| r.key().0 == snapshot && predicate(r.value()))
            .map(|r| Arc::clone(r.value()))
    }

    /// All records of `snapshot` satisfying `predicate`, ordered by id.
    pub fn filter(&self, snapshot: SnapshotId, predicate: impl Fn(&T) -> bool) -> Vec<Arc<T>> {
        let mut matched: Vec<(String, Arc<T>)> = self
            .records
            .iter()
            .filter(|r| r.key().0 == snapshot && predicate(r.value()))
            .map(|r| (r.key().1.clone(), Arc::clone(r.value())))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched.into_iter().map(|(_, record)| record).collect()
    }

    /// Number of records held for `snapshot`.
    pub fn count(&self, snapshot: SnapshotId) -> usize {
        self.records.iter().filter(|r| r.key().0 == snapshot).count()
    }

    /// Number of records across all snapshots.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<T: Send + Sync> SnapshotScoped for Collection<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn purge(&self, snapshot: SnapshotId) -> StoreResult<usize> {
        let before = self.records.len();
        self.records.retain(|key, _| key.0 != snapshot);
        Ok(before.saturating_sub(self.records.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_snapshot_scoped() {
        let collection = Collection::new("things");
        let a = SnapshotId::new(1);
        let b = SnapshotId::new(2);

        collection.insert(a, "x", 10);
        collection.insert(b, "x", 20);

        assert_eq!(*collection.get(a, "x").unwrap(), 10);
        assert_eq!(*collection.get(b, "x").unwrap(), 20);
        assert!(collection.get(a, "y").is_none());
        assert_eq!(collection.count(a), 1);
    }

    #[test]
    fn test_filter_is_ordered_by_id() {
        let collection = Collection::new("things");
        let snap = SnapshotId::new(1);
        collection.insert(snap, "c", 3);
        collection.insert(snap, "a", 1);
        collection.insert(snap, "b", 2);

        let values: Vec<i32> = collection.filter(snap, |_| true).iter().map(|v| **v).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_purge_only_touches_one_snapshot() {
        let collection = Collection::new("things");
        let a = SnapshotId::new(1);
        let b = SnapshotId::new(2);
        collection.insert(a, "x", 1);
        collection.insert(a, "y", 2);
        collection.insert(b, "x", 3);

        assert_eq!(collection.purge(a).unwrap(), 2);
        assert_eq!(collection.count(a), 0);
        assert_eq!(collection.count(b), 1);
    }
}
