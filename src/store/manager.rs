//! Snapshot lifecycle: refcounts, current flag, cascade delete.
//!
//! # State Transitions
//! ```text
//! install(id):    refcount + 1 (the "current" reference), current = true,
//!                 previous current → current = false, then release(previous)
//! acquire:        current snapshot refcount + 1
//! release(id):    refcount - 1; at 0 the snapshot and every record scoped
//!                 to it are deleted
//! ```
//!
//! # Design Decisions
//! - One mutex serializes every refcount read-modify-write
//! - A snapshot leaves the table under the lock, so no acquire can observe it
//!   while its records are being purged
//! - Releasing more than was acquired is a logged no-op

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use crate::observability::metrics;
use crate::store::datastore::SnapshotStore;
use crate::store::{Snapshot, SnapshotId, StoreError, StoreResult};

/// Owner of every snapshot's refcount.
#[derive(Debug)]
pub struct SnapshotManager {
    table: Mutex<HashMap<SnapshotId, Snapshot>>,
    store: Arc<SnapshotStore>,
}

impl SnapshotManager {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Return the current snapshot with its refcount incremented.
    pub fn acquire_current(&self) -> StoreResult<Snapshot> {
        let mut table = self.table.lock();
        let snapshot = table
            .values_mut()
            .find(|s| s.current)
            .ok_or(StoreError::NotFound)?;
        snapshot.refcount += 1;
        tracing::trace!(snapshot_id = %snapshot.id, refcount = snapshot.refcount, "Snapshot acquired");
        Ok(snapshot.clone())
    }

    /// Acquire the current snapshot as a guard that releases on drop.
    pub fn acquire_current_lease(self: &Arc<Self>) -> StoreResult<SnapshotLease> {
        let snapshot = self.acquire_current()?;
        Ok(SnapshotLease {
            manager: Arc::clone(self),
            snapshot,
        })
    }

    /// Decrement the refcount of `id`.
    ///
    /// Returns the updated snapshot, or `None` once it has been deleted
    /// (including when `id` is already gone).
    pub fn release(&self, id: SnapshotId) -> Option<Snapshot> {
        let mut table = self.table.lock();
        let snapshot = table.get_mut(&id)?;

        if snapshot.refcount == 0 {
            tracing::warn!(snapshot_id = %id, "Release without matching acquire ignored");
            return Some(snapshot.clone());
        }

        snapshot.refcount -= 1;
        if snapshot.refcount > 0 {
            return Some(snapshot.clone());
        }

        table.remove(&id);
        drop(table);
        self.cascade_delete(id);
        None
    }

    /// Register a snapshot created outside the manager (refcount untouched).
    pub fn register(&self, snapshot: Snapshot) {
        self.table.lock().insert(snapshot.id, snapshot);
    }

    /// Make `id` the current snapshot, holding one reference for as long as it is current.
    pub fn install(&self, id: SnapshotId) -> Snapshot {
        let mut table = self.table.lock();
        let previous: Vec<SnapshotId> = table
            .values_mut()
            .filter(|s| s.current && s.id != id)
            .map(|s| {
                s.current = false;
                s.id
            })
            .collect();

        let snapshot = table.entry(id).or_insert_with(|| Snapshot::new(id));
        if !snapshot.current {
            snapshot.refcount += 1;
            snapshot.current = true;
        }
        let installed = snapshot.clone();
        drop(table);

        tracing::info!(snapshot_id = %id, "Snapshot installed as current");
        for old in previous {
            self.release(old);
        }
        installed
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.table.lock().contains_key(&id)
    }

    /// The current snapshot without touching its refcount.
    pub fn current(&self) -> Option<Snapshot> {
        self.table.lock().values().find(|s| s.current).cloned()
    }

    pub fn get(&self, id: SnapshotId) -> Option<Snapshot> {
        self.table.lock().get(&id).cloned()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        let mut all: Vec<Snapshot> = self.table.lock().values().cloned().collect();
        all.sort_by_key(|s| s.id);
        all
    }

    fn cascade_delete(&self, id: SnapshotId) {
        let mut failures = 0;
        for scoped in self.store.scoped() {
            match scoped.purge(id) {
                Ok(removed) => {
                    tracing::debug!(snapshot_id = %id, collection = scoped.name(), removed, "Purged snapshot records");
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(snapshot_id = %id, collection = scoped.name(), error = %e, "Failed to purge snapshot records");
                }
            }
        }
        metrics::record_snapshot_deleted(failures == 0);
        tracing::info!(snapshot_id = %id, failures, "Snapshot deleted");
    }
}

/// A held reference to a snapshot, released when dropped.
#[derive(Debug)]
pub struct SnapshotLease {
    manager: Arc<SnapshotManager>,
    snapshot: Snapshot,
}

impl SnapshotLease {
    pub fn id(&self) -> SnapshotId {
        self.snapshot.id
    }
}

impl Deref for SnapshotLease {
    type Target = Snapshot;
    fn deref(&self) -> &Self::Target {
        &self.snapshot
    }
}

impl Drop for SnapshotLease {
    fn drop(&mut self) {
        self.manager.release(self.snapshot.id);
    }
}
