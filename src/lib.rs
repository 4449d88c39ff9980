//! Micro-gateway request routing core.
//!
//! Snapshots of gateway configuration are loaded into a [`store::SnapshotStore`],
//! indexed into per-credential Route Entries, and matched against inbound
//! requests to build the context handed to the policy pipeline.

pub mod config;
pub mod context;
pub mod http;
pub mod index;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod store;

pub use config::GatewayConfig;
pub use http::{AppState, GatewayServer};
pub use lifecycle::Shutdown;
