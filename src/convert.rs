//! JSON <-> GQL Value conversion utilities

use crate::Value;

/// Convert serde_json::Value to a GQL Value
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => number_to_value(&n),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => {
            Value::Object(obj.into_iter().map(|(k, v)| (k, json_to_value(v))).collect())
        }
    }
}

/// Like [`json_to_value`], but only for table cells: arrays and objects are refused.
pub fn json_to_scalar(v: serde_json::Value) -> Option<Value> {
    match v {
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        scalar => Some(json_to_value(scalar)),
    }
}

fn number_to_value(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Integer(i)
    } else {
        // u64 beyond i64::MAX and every non-integer land here
        n.as_f64().map(Value::Float).unwrap_or(Value::Null)
    }
}

/// Convert a GQL Value to serde_json::Value, keeping object key order.
///
/// Ranges render as their literal text and sets as arrays, since JSON has
/// neither.
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Range(r) => serde_json::Value::String(r.to_string()),
        Value::Set(set) => serde_json::Value::Array(set.iter().map(value_to_json).collect()),
        Value::Array(arr) => serde_json::Value::Array(arr.iter().map(value_to_json).collect()),
        Value::Object(obj) => serde_json::Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}
