//! Per-request context resolution.
//!
//! # Data Flow
//! ```text
//! Selected Candidate + GatewayRequest
//!     → variables.rs (identity, env, plan frozen; api.properties copied to root)
//!     → body.rs (request.body parsed per content type, cloned to message.body)
//!     → params.rs (raw lookup per location, concurrent type conversion, ordered merge)
//!     → Return: Context for the policy pipeline
//! ```
//!
//! # Design Decisions
//! - Parameter locations and value types are closed enums
//! - A failed conversion yields an absent value; only a body parse failure aborts
//! - The endpoint address is computed on first read

pub mod body;
pub mod params;
pub mod resolver;
pub mod value;
pub mod variables;

use axum::http::StatusCode;
use thiserror::Error;

pub use body::RequestBody;
pub use params::{convert_to_type, ValueType};
pub use resolver::{ContextResolver, PatternCache, ResolveOptions};
pub use value::ParamValue;
pub use variables::{Context, Endpoint};

/// Failures while building a request context.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to parse request body (attempted: {})", attempted.join(", "))]
    BodyParse { attempted: Vec<String> },

    #[error("context variable '{0}' is read-only")]
    ReadOnly(String),

    #[error("API '{0}' not found in snapshot")]
    ApiNotFound(String),
}

impl ResolveError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolveError::BodyParse { .. } => StatusCode::BAD_REQUEST,
            ResolveError::ReadOnly(_) | ResolveError::ApiNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
