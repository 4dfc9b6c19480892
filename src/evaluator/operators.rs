//! Value coercion and comparison primitives shared by the condition and
//! expression evaluators.

use serde_json::Value;

/// String form of a value: a string is itself (unquoted), null is empty,
/// anything else renders as JSON.
pub fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Numeric form of a value. Strings parse; everything else is non-numeric.
pub fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality: numbers compare numerically (so `2` equals `2.0`), everything
/// else compares structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

pub fn contains(value: &Value, target: &Value) -> bool {
    value_to_string(value).contains(&value_to_string(target))
}

pub fn starts_with(value: &Value, target: &Value) -> bool {
    value_to_string(value).starts_with(&value_to_string(target))
}

pub fn ends_with(value: &Value, target: &Value) -> bool {
    value_to_string(value).ends_with(&value_to_string(target))
}
