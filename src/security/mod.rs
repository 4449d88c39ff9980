//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Selected Candidate:
//!     → rate_limit.rs (plan limits keyed scope:clientId:name)
//!     → Pass to context resolution
//! ```
//!
//! # Design Decisions
//! - Limiter state is an owned value injected into the server, never a global
//! - Fail closed: an exhausted limit rejects the request

pub mod rate_limit;

pub use rate_limit::{Quota, RateLimitExceeded, RateLimiterCache};
