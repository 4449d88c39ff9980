//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, limits)
//!     → routing (visible entries → Candidates → one selected)
//!     → security (plan rate limits)
//!     → context (resolve variables, body, parameters)
//!     → pipeline.rs (policy/assembly engine)
//!     → Send to client
//!
//! Snapshot store listener:
//!     GET /current → acquire_current
//!     GET /release?id= → release
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{ContextEcho, PolicyPipeline};
pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
