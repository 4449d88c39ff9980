//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast to server, index worker, snapshot watcher loop
//!     → server stops accepting, drains in-flight requests (leases released)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup in main: config, store, index worker, snapshot load, listeners
//! - Listeners start last (traffic only when a snapshot may be current)

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
