//! Gateway error and preflight responses.
//!
//! Errors use the `{httpCode, httpMessage, moreInformation}` JSON body so a
//! client cannot tell a missing API from one it may not call.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub fn error_response(status: StatusCode, more_information: impl Into<String>) -> Response {
    let body = json!({
        "httpCode": status.as_u16().to_string(),
        "httpMessage": status.canonical_reason().unwrap_or("Error"),
        "moreInformation": more_information.into(),
    });
    (status, Json(body)).into_response()
}

/// Answer a CORS preflight with the route's allowed methods.
pub fn preflight_response(allow_methods: &str, request_headers: &HeaderMap) -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    if let Ok(methods) = HeaderValue::from_str(allow_methods) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
    }
    if let Some(requested) = request_headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    apply_allow_origin(&mut response, request_headers);
    response
}

/// Echo the caller's `Origin` (or `*`) on a CORS-enabled route.
pub fn apply_allow_origin(response: &mut Response, request_headers: &HeaderMap) {
    let origin = request_headers
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
}
