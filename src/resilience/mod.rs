//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request needs the current snapshot:
//!     → SnapshotManager::acquire_current
//!     → On NotFound: backoff.rs (sleep with jittered exponential delay, retry)
//!     → After max_attempts: 503 to the caller
//! ```
//!
//! # Design Decisions
//! - Only "no current snapshot" is retried; every other failure returns at once
//! - Delays are capped and jittered so waiting requests do not retry in lockstep

pub mod backoff;

pub use backoff::{calculate_backoff, retry_with_backoff};
