//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, uri, headers, body)
//!     → request.rs (normalize method + path, caller credentials)
//!     → store visible_entries (caller's Route Entries)
//!     → matcher.rs (regex test, method/CORS check, keep minimal score)
//!     → Return: tied Candidates or NoMatch
//! ```
//!
//! # Design Decisions
//! - Stateless over immutable snapshot data; safe for any number of concurrent requests
//! - Ties are preserved, the authentication stage picks among them
//! - NoMatch never says why (no API existence leak)

pub mod matcher;
pub mod request;

use axum::http::StatusCode;
use thiserror::Error;

pub use matcher::{find_candidates, select_candidate, Candidate};
pub use request::GatewayRequest;

/// Routing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("unable to process the request")]
    NoMatch,
}

impl MatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MatchError::NoMatch => StatusCode::NOT_FOUND,
        }
    }
}
