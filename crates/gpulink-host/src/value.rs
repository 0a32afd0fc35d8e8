use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A decoded field value.
///
/// Struct fields keep their declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    /// An enum value; `name` is `None` when no enumerator matches. The value
    /// spans both `int64` and `uint64` backings.
    Enum {
        name: Option<String>,
        value: i128,
    },
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Field of a struct value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Integer view of a scalar, if it has one.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(i128::from(*v)),
            Value::UInt(v) => Some(i128::from(*v)),
            Value::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Convert to JSON; enums become their enumerator name when known.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(v) => serde_json::Value::from(*v),
            Value::UInt(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Enum { name: Some(name), .. } => serde_json::Value::from(name.as_str()),
            Value::Enum { name: None, value } => match (i64::try_from(*value), u64::try_from(*value)) {
                (Ok(v), _) => serde_json::Value::from(v),
                (_, Ok(v)) => serde_json::Value::from(v),
                _ => serde_json::Value::from(*value as f64),
            },
            Value::Array(items) => items.iter().map(Value::to_json).collect(),
            Value::Struct(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Enum { name: Some(name), .. } => serializer.serialize_str(name),
            Value::Enum { name: None, value } => match u64::try_from(*value) {
                Ok(v) => serializer.serialize_u64(v),
                Err(_) => serializer.serialize_i128(*value),
            },
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Struct(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_in_field_order() {
        let value = Value::Struct(vec![
            ("z".to_string(), Value::UInt(1)),
            (
                "mode".to_string(),
                Value::Enum {
                    name: Some("Line".to_string()),
                    value: 4,
                },
            ),
            ("data".to_string(), Value::Array(vec![Value::Int(-1), Value::Float(0.5)])),
        ]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"z":1,"mode":"Line","data":[-1,0.5]}"#);
    }

    #[test]
    fn json_conversion_and_accessors() {
        let value = Value::Struct(vec![(
            "code".to_string(),
            Value::Enum {
                name: None,
                value: 9,
            },
        )]);
        assert_eq!(value.to_json(), serde_json::json!({ "code": 9 }));
        assert_eq!(value.field("code").unwrap().as_i128(), Some(9));
        assert!(value.field("missing").is_none());
        assert_eq!(Value::UInt(3).as_f64(), Some(3.0));
    }

    #[test]
    fn unsigned_enum_values_above_i64() {
        let value = Value::Enum {
            name: None,
            value: 1i128 << 63,
        };
        assert_eq!(value.to_json(), serde_json::json!(9_223_372_036_854_775_808u64));
        assert_eq!(serde_json::to_string(&value).unwrap(), "9223372036854775808");

        let negative = Value::Enum {
            name: None,
            value: -3,
        };
        assert_eq!(negative.to_json(), serde_json::json!(-3));
        assert_eq!(serde_json::to_string(&negative).unwrap(), "-3");
    }
}
