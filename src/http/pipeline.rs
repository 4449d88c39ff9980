//! The hand-off point to the policy/assembly engine.

use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::BoxFuture;

use crate::context::Context;

/// Executes an API's assembly against a resolved context.
pub trait PolicyPipeline: Send + Sync {
    fn execute(&self, context: Context) -> BoxFuture<'static, Response>;
}

/// Answers with the resolved context as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextEcho;

impl PolicyPipeline for ContextEcho {
    fn execute(&self, context: Context) -> BoxFuture<'static, Response> {
        Box::pin(async move { Json(context.to_json()).into_response() })
    }
}
