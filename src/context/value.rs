//! Typed parameter values.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

/// A resolved parameter, before or after type conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Bytes),
    Date(DateTime<FixedOffset>),
    Array(Vec<ParamValue>),
    Json(Value),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            ParamValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Render as JSON. `NaN` becomes `null`, bytes become lossy UTF-8.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            ParamValue::Date(d) => Value::String(d.to_rfc3339()),
            ParamValue::Array(items) => Value::Array(items.iter().map(ParamValue::to_json).collect()),
            ParamValue::Json(v) => v.clone(),
        }
    }
}

impl From<Vec<String>> for ParamValue {
    /// One value stays scalar; repeats become an array.
    fn from(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            ParamValue::String(values.remove(0))
        } else {
            ParamValue::Array(values.into_iter().map(ParamValue::String).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_json() {
        assert_eq!(ParamValue::Number(f64::NAN).to_json(), Value::Null);
        assert_eq!(ParamValue::Number(2.5).to_json(), json!(2.5));
        assert_eq!(
            ParamValue::Array(vec![ParamValue::Bool(true), ParamValue::Bytes(Bytes::from_static(b"hi"))]).to_json(),
            json!([true, "hi"])
        );
    }

    #[test]
    fn test_from_repeated_values() {
        assert_eq!(ParamValue::from(vec!["a".to_string()]), ParamValue::String("a".into()));
        assert_eq!(
            ParamValue::from(vec!["a".to_string(), "b".to_string()]),
            ParamValue::Array(vec![ParamValue::String("a".into()), ParamValue::String("b".into())])
        );
    }
}
