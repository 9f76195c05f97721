//! Runtime type names for parameter values.
//!
//! Payloads are plain `serde_json::Value`s. This module classifies them into
//! the type names reported in metadata and used for set-time type checks.

use std::cmp::Ordering;

use serde_json::Value;

/// The runtime type of a parameter value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ParameterType {
    None,
    Bool,
    Int,
    Float,
    Str,
    List,
    Dict,
}

impl ParameterType {
    /// Classify a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_f64() => Self::Float,
            Value::Number(_) => Self::Int,
            Value::String(_) => Self::Str,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Dict,
        }
    }

    /// Whether a value may be stored in a parameter of this type.
    ///
    /// `None` accepts anything, and integers are accepted for floats since
    /// JSON does not distinguish the two.
    pub fn accepts(self, value: &Value) -> bool {
        let got = Self::of(value);
        self == Self::None || got == self || (self == Self::Float && got == Self::Int)
    }
}

/// Compare two JSON numbers by value. Returns `None` if either is not a number.
pub fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    let (Value::Number(a), Value::Number(b)) = (a, b) else {
        return None;
    };
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Equality that treats `5` and `5.0` as the same value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_numbers(a, b) {
        Some(ord) => ord == Ordering::Equal,
        None => a == b,
    }
}
