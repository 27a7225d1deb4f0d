//! Bound parameter values and their query types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A value bound to a query parameter or compared against in criteria.
///
/// Serializes untagged so criteria can travel as plain JSON
/// (`{"field": "status", "op": "eq", "value": "active"}`). Decoding maps every
/// JSON string to [`Value::String`]; the typed variants are built in Rust only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Borrow the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Date(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a boolean, a number, a string or a list")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {v} is out of range")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// The query type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    Date,
    Guid,
    IntegerArray,
    StringArray,
}

impl ParamType {
    /// Infer the parameter type from a value.
    ///
    /// Lists whose non-null elements are all integers become [`ParamType::IntegerArray`];
    /// any other list is a [`ParamType::StringArray`]. `Null` falls back to `String`.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Int(_) => ParamType::Integer,
            Value::Float(_) => ParamType::Float,
            Value::Bool(_) => ParamType::Boolean,
            Value::DateTime(_) => ParamType::DateTime,
            Value::Date(_) => ParamType::Date,
            Value::Uuid(_) => ParamType::Guid,
            Value::List(items) => {
                let mut non_null = items.iter().filter(|v| !v.is_null()).peekable();
                if non_null.peek().is_some() && non_null.all(|v| matches!(v, Value::Int(_))) {
                    ParamType::IntegerArray
                } else {
                    ParamType::StringArray
                }
            }
            Value::Null | Value::String(_) => ParamType::String,
        }
    }

    /// The array type holding elements of this type.
    pub fn array_of(self) -> Self {
        match self {
            ParamType::Integer | ParamType::IntegerArray => ParamType::IntegerArray,
            _ => ParamType::StringArray,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, ParamType::IntegerArray | ParamType::StringArray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_scalar_types() {
        assert_eq!(ParamType::infer(&Value::from(1)), ParamType::Integer);
        assert_eq!(ParamType::infer(&Value::from(1.5)), ParamType::Float);
        assert_eq!(ParamType::infer(&Value::from(true)), ParamType::Boolean);
        assert_eq!(ParamType::infer(&Value::from("x")), ParamType::String);
        assert_eq!(ParamType::infer(&Value::Null), ParamType::String);
        assert_eq!(ParamType::infer(&Value::from(Uuid::nil())), ParamType::Guid);
    }

    #[test]
    fn infers_array_types() {
        assert_eq!(
            ParamType::infer(&Value::from(vec![1, 2, 3])),
            ParamType::IntegerArray
        );
        assert_eq!(
            ParamType::infer(&Value::List(vec![Value::from(1), Value::Null])),
            ParamType::IntegerArray
        );
        assert_eq!(
            ParamType::infer(&Value::from(vec!["a", "b"])),
            ParamType::StringArray
        );
        assert_eq!(ParamType::infer(&Value::List(vec![])), ParamType::StringArray);
    }

    #[test]
    fn option_maps_to_null() {
        let none: Option<i32> = None;
        assert!(Value::from(none).is_null());
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }

    #[test]
    fn deserializes_untagged_json() {
        let v: Value = serde_json::from_str(r#"[1, "a", null, true]"#).unwrap();
        assert_eq!(
            v,
            Value::List(vec![
                Value::Int(1),
                Value::String("a".into()),
                Value::Null,
                Value::Bool(true)
            ])
        );
    }

    #[test]
    fn json_strings_stay_strings() {
        let v: Value = serde_json::from_str(
            r#"["2024-01-01", "2024-01-01T10:00:00Z", "67e55044-10b1-426f-9247-bb680e5fe0c8"]"#,
        )
        .unwrap();
        let Value::List(items) = v else { panic!("expected a list") };
        assert!(items.iter().all(|item| matches!(item, Value::String(_))));
    }

    #[test]
    fn rejects_json_objects() {
        assert!(serde_json::from_str::<Value>(r#"{"a": 1}"#).is_err());
    }
}
