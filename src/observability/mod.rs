//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG / observability.log_level)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems via the trace span
//! - Metrics are cheap (atomic increments); recording without an installed recorder is a no-op
//! - Background failures (index builds, cascade deletes) surface here, never to callers

pub mod logging;
pub mod metrics;
