//! Parameter extraction and type conversion.
//!
//! # Responsibilities
//! - Look up the raw value of each declared parameter by location
//! - Convert raw values per declared `type`/`format`
//! - Merge results in declaration order, splitting a trailing `+name` on `/`
//!
//! # Design Decisions
//! - Missing input stays missing whatever the declared type
//! - Failed conversions yield an absent value, never an error

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use futures_util::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;

use crate::context::{ParamValue, RequestBody};
use crate::index::template::ParamPattern;
use crate::routing::GatewayRequest;
use crate::store::model::{CollectionFormat, ParamLocation, Parameter, TypeSchema};

/// Declared value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Array,
    Boolean,
    Binary,
    Byte,
    Date,
    DateTime,
    Number,
    Object,
    Password,
    String,
    File,
    Unspecified,
}

impl ValueType {
    /// `format` wins over `type` when it names a known conversion.
    pub fn of(schema: &TypeSchema) -> ValueType {
        schema
            .format
            .as_deref()
            .and_then(Self::from_format)
            .or_else(|| schema.kind.as_deref().and_then(Self::from_name))
            .unwrap_or(ValueType::Unspecified)
    }

    fn from_format(format: &str) -> Option<ValueType> {
        match format {
            "binary" => Some(ValueType::Binary),
            "byte" => Some(ValueType::Byte),
            "date" => Some(ValueType::Date),
            "date-time" | "dateTime" => Some(ValueType::DateTime),
            "double" | "float" | "int32" | "int64" | "long" => Some(ValueType::Number),
            "password" => Some(ValueType::Password),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<ValueType> {
        match name {
            "array" => Some(ValueType::Array),
            "boolean" => Some(ValueType::Boolean),
            "file" => Some(ValueType::File),
            "integer" | "number" => Some(ValueType::Number),
            "object" => Some(ValueType::Object),
            "string" => Some(ValueType::String),
            other => Self::from_format(other),
        }
    }
}

/// Convert a raw value to the declared type of `schema`.
pub fn convert_to_type(value: Option<ParamValue>, schema: &TypeSchema) -> Option<ParamValue> {
    let value = value?;
    match ValueType::of(schema) {
        ValueType::Array => to_array(value, schema),
        ValueType::Boolean => to_bool(value),
        ValueType::Binary | ValueType::Byte => Some(to_bytes(value)),
        ValueType::Date | ValueType::DateTime => to_date(&value),
        ValueType::Number => Some(ParamValue::Number(to_number(&value))),
        ValueType::Object => to_object(value),
        ValueType::Password | ValueType::String => Some(ParamValue::String(to_string(&value))),
        ValueType::File => None,
        ValueType::Unspecified => Some(value),
    }
}

fn to_array(value: ParamValue, schema: &TypeSchema) -> Option<ParamValue> {
    let format = schema.collection_format.unwrap_or_default();
    let items = schema.items.as_deref();
    let elements: Vec<ParamValue> = match value {
        ParamValue::Array(elements) => elements,
        ParamValue::Json(Value::Array(elements)) => elements.into_iter().map(ParamValue::Json).collect(),
        // A single `multi` value is passed through as is.
        scalar if format == CollectionFormat::Multi => {
            return match items {
                Some(items) => convert_to_type(Some(scalar), items),
                None => Some(scalar),
            };
        }
        ParamValue::String(s) | ParamValue::Json(Value::String(s)) => split_collection(s, format),
        other => vec![other],
    };

    // Elements that fail to convert keep their slot as `null`.
    Some(ParamValue::Array(
        elements
            .into_iter()
            .map(|element| match items {
                Some(items) => convert_to_type(Some(element), items).unwrap_or(ParamValue::Json(Value::Null)),
                None => element,
            })
            .collect(),
    ))
}

fn split_collection(s: String, format: CollectionFormat) -> Vec<ParamValue> {
    match format.delimiter() {
        Some(delimiter) => s.split(delimiter).map(|part| ParamValue::String(part.to_string())).collect(),
        None => vec![ParamValue::String(s)],
    }
}

fn to_bool(value: ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Bool(b) | ParamValue::Json(Value::Bool(b)) => Some(ParamValue::Bool(b)),
        other => match other.as_str() {
            Some(s) if s.eq_ignore_ascii_case("true") => Some(ParamValue::Bool(true)),
            Some(s) if s.eq_ignore_ascii_case("false") => Some(ParamValue::Bool(false)),
            _ => None,
        },
    }
}

fn to_bytes(value: ParamValue) -> ParamValue {
    match value {
        ParamValue::Bytes(b) => ParamValue::Bytes(b),
        other => ParamValue::Bytes(Bytes::from(to_string(&other))),
    }
}

fn to_date(value: &ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Date(d) => Some(ParamValue::Date(*d)),
        other => other.as_str().and_then(parse_date).map(ParamValue::Date),
    }
}

fn parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d);
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(s) {
        return Some(d);
    }
    let utc = FixedOffset::east_opt(0)?;
    if let Ok(d) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(d.and_utc().with_timezone(&utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc().with_timezone(&utc))
}

fn to_number(value: &ParamValue) -> f64 {
    match value {
        ParamValue::Number(n) => *n,
        ParamValue::Bool(b) => f64::from(u8::from(*b)),
        ParamValue::Json(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        ParamValue::Json(Value::Bool(b)) => f64::from(u8::from(*b)),
        other => other
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(f64::NAN),
    }
}

fn to_object(value: ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Json(Value::String(s)) | ParamValue::String(s) => {
            serde_json::from_str(&s).ok().map(ParamValue::Json)
        }
        ParamValue::Bytes(b) => serde_json::from_slice(&b).ok().map(ParamValue::Json),
        ParamValue::Json(v) => Some(ParamValue::Json(v)),
        _ => None,
    }
}

fn to_string(value: &ParamValue) -> String {
    match value {
        ParamValue::String(s) | ParamValue::Json(Value::String(s)) => s.clone(),
        ParamValue::Bool(b) => b.to_string(),
        ParamValue::Number(n) => format_number(*n),
        ParamValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        ParamValue::Date(d) => d.to_rfc3339(),
        ParamValue::Array(items) => items.iter().map(to_string).collect::<Vec<_>>().join(","),
        ParamValue::Json(v) => v.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Inputs a parameter can be read from.
pub struct ParamSources<'a> {
    pub request: &'a GatewayRequest,
    pub query: &'a IndexMap<String, Vec<String>>,
    pub pattern: Option<&'a ParamPattern>,
    pub body: Option<&'a RequestBody>,
}

fn raw_value(param: &Parameter, sources: &ParamSources<'_>) -> Option<ParamValue> {
    match param.location {
        ParamLocation::Path => {
            let pattern = sources.pattern?;
            let path = &sources.request.path;
            pattern
                .capture(path, &param.name)
                .or_else(|| pattern.capture(path, &format!("+{}", param.name)))
                .map(ParamValue::String)
        }
        ParamLocation::Query => sources.query.get(&param.name).cloned().map(ParamValue::from),
        ParamLocation::Header => sources
            .request
            .header(&param.name.to_ascii_lowercase())
            .map(|v| ParamValue::String(v.to_string())),
        ParamLocation::Body => sources.body.map(RequestBody::to_param),
        ParamLocation::FormData => sources.body.and_then(|body| body.form_field(&param.name)),
        ParamLocation::Other => None,
    }
}

/// Resolve every declared parameter and merge the results by name.
///
/// A converted value of `None` is left out of the map.
pub async fn resolve_parameters(params: &[Parameter], sources: &ParamSources<'_>) -> IndexMap<String, ParamValue> {
    let resolved = join_all(params.iter().map(|param| async move {
        let raw = raw_value(param, sources);
        convert_to_type(raw, &param.schema)
    }))
    .await;

    let last = params.len().saturating_sub(1);
    let mut merged = IndexMap::new();
    for (position, (param, value)) in params.iter().zip(resolved).enumerate() {
        let Some(value) = value else { continue };
        match param.name.strip_prefix('+') {
            Some(name) if position == last => {
                let value = match value {
                    ParamValue::String(s) => {
                        ParamValue::Array(s.split('/').map(|part| ParamValue::String(part.to_string())).collect())
                    }
                    other => other,
                };
                merged.insert(name.to_string(), value);
            }
            _ => {
                merged.insert(param.name.clone(), value);
            }
        }
    }
    merged
}
