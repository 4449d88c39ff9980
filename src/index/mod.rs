//! Route index subsystem.
//!
//! # Data Flow
//! ```text
//! Subscription / Product persisted
//!     → worker.rs (IndexQueue event, one task per record)
//!     → builder.rs (join product → catalog → organization, reconcile APIs)
//!     → template.rs (path-regex + matching score per URL template)
//!     → RouteEntry per (credential × API) written back to the store
//! ```
//!
//! # Design Decisions
//! - Built off the request path; a failed build is logged, never surfaced to the writer
//! - Entries are additive and keyed so a retried build overwrites identical content
//! - Scores are a pure function of the template so any re-derivation agrees

pub mod builder;
pub mod entry;
pub mod template;
pub mod worker;

use thiserror::Error;

pub use builder::IndexBuilder;
pub use entry::{MethodEntry, RouteEntry, RoutePath};
pub use worker::{IndexEvent, IndexQueue, IndexWorker};

/// Errors raised while building route entries for one record.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("subscription {0} not found")]
    SubscriptionNotFound(String),

    #[error("product {0} not found")]
    ProductNotFound(String),

    #[error("catalog {0} not found")]
    CatalogNotFound(String),

    #[error("API {name}:{version} not found")]
    ApiNotFound { name: String, version: String },

    #[error("invalid path item {template}: {source}")]
    InvalidPathItem {
        template: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
