//! Request body parsing by content type.
//!
//! # Responsibilities
//! - Try each candidate content type in order until one parses
//! - Decode text with the charset from the request's `Content-Type`
//!
//! # Design Decisions
//! - Unknown content types keep the raw bytes and always succeed
//! - An empty body is never parsed

use bytes::Bytes;
use indexmap::IndexMap;
use mime::Mime;
use serde_json::Value;

use crate::context::{ParamValue, ResolveError, ResolveResult};

/// A parsed request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    Form(IndexMap<String, Vec<String>>),
    Binary(Bytes),
}

impl RequestBody {
    /// Copy that shares no storage with `self`.
    pub fn detached(&self) -> RequestBody {
        match self {
            RequestBody::Binary(bytes) => RequestBody::Binary(Bytes::copy_from_slice(bytes)),
            other => other.clone(),
        }
    }

    pub fn form_field(&self, name: &str) -> Option<ParamValue> {
        match self {
            RequestBody::Form(fields) => fields.get(name).cloned().map(ParamValue::from),
            _ => None,
        }
    }

    pub fn to_param(&self) -> ParamValue {
        match self {
            RequestBody::Json(v) => ParamValue::Json(v.clone()),
            RequestBody::Text(s) => ParamValue::String(s.clone()),
            RequestBody::Form(fields) => ParamValue::Json(form_json(fields)),
            RequestBody::Binary(b) => ParamValue::Bytes(b.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RequestBody::Form(fields) => form_json(fields),
            other => other.to_param().to_json(),
        }
    }
}

fn form_json(fields: &IndexMap<String, Vec<String>>) -> Value {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), ParamValue::from(v.clone()).to_json()))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// How a content type is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Text,
    Form,
    Binary,
}

fn body_kind(content_type: &Mime) -> BodyKind {
    let subtype = content_type.subtype();
    let suffix = content_type.suffix();
    if subtype == mime::JSON || suffix == Some(mime::JSON) {
        BodyKind::Json
    } else if subtype == mime::WWW_FORM_URLENCODED {
        BodyKind::Form
    } else if content_type.type_() == mime::TEXT || subtype == mime::XML || suffix == Some(mime::XML) {
        BodyKind::Text
    } else {
        BodyKind::Binary
    }
}

/// Parse `body` by trying each of `candidates` in order.
///
/// `request_content_type` is the raw `Content-Type` header; it supplies the charset.
/// Returns `Ok(None)` for an empty body.
pub fn parse_body(
    body: &Bytes,
    candidates: &[String],
    request_content_type: Option<&str>,
) -> ResolveResult<Option<RequestBody>> {
    if body.is_empty() {
        return Ok(None);
    }

    let charset = request_content_type
        .and_then(|ct| ct.parse::<Mime>().ok())
        .and_then(|ct| ct.get_param(mime::CHARSET).map(|c| c.as_str().to_ascii_lowercase()))
        .unwrap_or_else(|| "utf-8".to_string());

    for candidate in candidates {
        let Ok(content_type) = candidate.parse::<Mime>() else {
            tracing::debug!(content_type = %candidate, "Skipping unparseable content type");
            continue;
        };
        let parsed = match body_kind(&content_type) {
            BodyKind::Json => decode_text(body, &charset)
                .and_then(|text| serde_json::from_str(&text).ok())
                .map(RequestBody::Json),
            BodyKind::Text => decode_text(body, &charset).map(RequestBody::Text),
            BodyKind::Form => Some(RequestBody::Form(parse_form(body))),
            BodyKind::Binary => Some(RequestBody::Binary(body.clone())),
        };
        if parsed.is_some() {
            return Ok(parsed);
        }
    }

    Err(ResolveError::BodyParse {
        attempted: candidates.to_vec(),
    })
}

fn decode_text(body: &[u8], charset: &str) -> Option<String> {
    match charset {
        "utf-8" | "utf8" => std::str::from_utf8(body).ok().map(str::to_string),
        "us-ascii" | "ascii" => body.is_ascii().then(|| String::from_utf8_lossy(body).into_owned()),
        "iso-8859-1" | "latin1" => Some(body.iter().map(|&b| b as char).collect()),
        other => {
            tracing::debug!(charset = %other, "Unsupported charset");
            None
        }
    }
}

fn parse_form(body: &[u8]) -> IndexMap<String, Vec<String>> {
    let mut fields: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        fields.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    fields
}
