//! Snapshot store subsystem.
//!
//! # Data Flow
//! ```text
//! snapshot directory (<config_root>/<id>/*.json) or external puller
//!     → loader.rs (decode records, persist in dependency order)
//!     → datastore.rs (snapshot-scoped collections keyed by (snapshot-id, id))
//!     → IndexQueue event per persisted Subscription / Product
//!     → manager.rs install: flip `current`, release previous generation
//!
//! Per request:
//!     manager.rs acquire_current (refcount + 1)
//!     → datastore.rs visible_entries
//!     → ... matching / context resolution ...
//!     → manager.rs release (refcount - 1, cascade delete at zero)
//! ```
//!
//! # Design Decisions
//! - Records are immutable once persisted; a new generation is a new snapshot
//! - All refcount changes go through one lock in the manager
//! - Cascade delete is best-effort per collection (log and continue)

pub mod collection;
pub mod datastore;
pub mod loader;
pub mod manager;
pub mod model;
pub mod snapshot;
pub mod watcher;

use thiserror::Error;

pub use collection::{Collection, SnapshotScoped};
pub use datastore::SnapshotStore;
pub use loader::SnapshotLoader;
pub use manager::{SnapshotLease, SnapshotManager};
pub use snapshot::{Snapshot, SnapshotId};

/// Errors raised by the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot is flagged current yet; callers retry with backoff.
    #[error("no current snapshot")]
    NotFound,

    /// The snapshot id is not known to the manager.
    #[error("unknown snapshot {0}")]
    UnknownSnapshot(SnapshotId),

    /// Snapshot ids are 5-digit decimal strings below 65536.
    #[error("invalid snapshot id: {0:?}")]
    InvalidSnapshotId(String),

    /// Filesystem failure while loading or removing a snapshot directory.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record file could not be decoded.
    #[error("failed to decode {file}: {source}")]
    Decode {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
