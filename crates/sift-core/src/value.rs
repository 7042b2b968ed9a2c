//! Typed filter values.
//!
//! Raw plans carry filter values as arbitrary JSON. Validation turns them into
//! a [`FilterValue`] whose variant is dictated by the operator, so the
//! compiler never has to inspect value shapes at render time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bindable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Convert a JSON scalar. Returns `None` for null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "number",
            Self::Text(_) => "string",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Value slot of a validated filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// Comparison against a single value.
    Scalar(ScalarValue),
    /// Closed `[start, end]` range.
    Range(ScalarValue, ScalarValue),
    /// Non-empty membership list.
    List(Vec<ScalarValue>),
}

impl FilterValue {
    /// All scalar values in slot order.
    pub fn values(&self) -> Vec<&ScalarValue> {
        match self {
            Self::Scalar(v) => vec![v],
            Self::Range(start, end) => vec![start, end],
            Self::List(items) => items.iter().collect(),
        }
    }
}

/// A value bound to a named placeholder in compiled query text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundValue {
    Scalar(ScalarValue),
    List(Vec<ScalarValue>),
}

impl From<ScalarValue> for BoundValue {
    fn from(value: ScalarValue) -> Self {
        Self::Scalar(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_from_json() {
        assert_eq!(
            ScalarValue::from_json(&json!("Cluj%")),
            Some(ScalarValue::Text("Cluj%".into()))
        );
        assert_eq!(ScalarValue::from_json(&json!(25)), Some(ScalarValue::Integer(25)));
        assert_eq!(ScalarValue::from_json(&json!(2.5)), Some(ScalarValue::Float(2.5)));
        assert_eq!(ScalarValue::from_json(&json!(true)), Some(ScalarValue::Boolean(true)));
        assert_eq!(ScalarValue::from_json(&json!(null)), None);
        assert_eq!(ScalarValue::from_json(&json!(["a"])), None);
        assert_eq!(ScalarValue::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn bound_values_serialize_as_plain_json() {
        let v = BoundValue::List(vec![
            ScalarValue::Text("auto".into()),
            ScalarValue::Text("home".into()),
        ]);
        assert_eq!(serde_json::to_value(&v).unwrap(), json!(["auto", "home"]));

        let v = BoundValue::Scalar(ScalarValue::Float(12.5));
        assert_eq!(serde_json::to_value(&v).unwrap(), json!(12.5));
    }
}
