use crate::double::Double;
use crate::identity::Impersonate;
use chrono::{DateTime, Utc};
use std::fmt;

/// A value held by an attribute, an association, a method override or a
/// test-context slot.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
    Double(Double),
    List(Vec<Value>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<&Double> {
        match self {
            Value::Double(double) => Some(double),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    /// Case-equality check usable on any value: only doubles impersonating
    /// `ty` (or a subtype of it) answer true.
    pub fn is_instance_of(&self, ty: &str) -> bool {
        self.as_double()
            .map(|double| double.is_instance_of(ty))
            .unwrap_or(false)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Time(_) => "time",
            Value::Double(_) => "double",
            Value::List(_) => "list",
        }
    }

    /// Shallow JSON rendering. Nested doubles render as their type and
    /// identifier so reference cycles between doubles stay finite.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Value::from(*value),
            Value::Str(value) => serde_json::Value::String(value.clone()),
            Value::Time(value) => serde_json::Value::String(value.to_rfc3339()),
            Value::Double(double) => serde_json::json!({
                "type": double.reported_type().name(),
                "id": double.id().to_json(),
            }),
            Value::List(values) => values.iter().map(Value::to_json).collect(),
        }
    }
}

/// Doubles compare by identity, everything else structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::Time(value) => write!(f, "{}", value.to_rfc3339()),
            Value::Double(double) => write!(f, "#<{} {}>", double.reported_type(), double.id()),
            Value::List(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

impl From<Double> for Value {
    fn from(value: Double) -> Self {
        Value::Double(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl From<Vec<Double>> for Value {
    fn from(doubles: Vec<Double>) -> Self {
        Value::List(doubles.into_iter().map(Value::Double).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from("a topic"), Value::Str("a topic".into()));
        assert_eq!(Value::from(None::<i64>), Value::Nil);
        assert_eq!(Value::from(Some(false)), Value::Bool(false));
        assert_eq!(Value::from(2).as_float(), Some(2.0));
    }

    #[test]
    fn test_display_renders_params() {
        assert_eq!(Value::Int(1).to_string(), "1");
        assert_eq!(Value::Nil.to_string(), "");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("x")]).to_string(),
            "[1, x]"
        );
    }

    #[test]
    fn test_scalars_are_never_instances() {
        assert!(!Value::from("Blog").is_instance_of("Blog"));
        assert!(!Value::Nil.is_instance_of("Blog"));
    }

    #[test]
    fn test_to_json() {
        let value = Value::List(vec![Value::Int(1), Value::Nil, Value::from(true)]);
        assert_eq!(value.to_json(), serde_json::json!([1, null, true]));
    }
}
