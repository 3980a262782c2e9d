//! Loosely typed tree values, as produced by a text serializer.

use std::collections::BTreeMap;

/// A number together with the kind it was declared as.
///
/// The kind, not the magnitude, decides which tag a number becomes.
#[derive(Clone, Debug, PartialEq)]
pub enum Numeric {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// A literal that was never narrowed to a concrete kind.
    Lazy(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DynamicValue {
    Null,
    Bool(bool),
    Number(Numeric),
    Text(String),
    Sequence(Vec<DynamicValue>),
    /// Key order carries no meaning.
    Mapping(BTreeMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn text(value: impl Into<String>) -> Self {
        DynamicValue::Text(value.into())
    }

    pub fn int(value: i32) -> Self {
        DynamicValue::Number(Numeric::Int(value))
    }

    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, DynamicValue)>) -> Self {
        DynamicValue::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Reads a boolean, also accepting the byte 0/1 shape booleans take
    /// after a trip through binary tags.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            DynamicValue::Number(Numeric::Byte(0)) => Some(false),
            DynamicValue::Number(Numeric::Byte(1)) => Some(true),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        match self {
            DynamicValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Renders this value as JSON. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            DynamicValue::Null => Value::Null,
            DynamicValue::Bool(b) => Value::Bool(*b),
            DynamicValue::Number(n) => match n {
                Numeric::Byte(v) => Value::from(*v),
                Numeric::Short(v) => Value::from(*v),
                Numeric::Int(v) => Value::from(*v),
                Numeric::Long(v) => Value::from(*v),
                Numeric::Float(v) => serde_json::Number::from_f64(f64::from(*v))
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                Numeric::Double(v) => serde_json::Number::from_f64(*v)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                Numeric::Lazy(literal) => literal
                    .parse::<serde_json::Number>()
                    .map(Value::Number)
                    .unwrap_or_else(|_| Value::String(literal.clone())),
            },
            DynamicValue::Text(s) => Value::String(s.clone()),
            DynamicValue::Sequence(items) => Value::Array(items.iter().map(DynamicValue::to_json).collect()),
            DynamicValue::Mapping(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }
}

impl From<serde_json::Value> for DynamicValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => DynamicValue::Null,
            Value::Bool(b) => DynamicValue::Bool(b),
            Value::Number(n) => DynamicValue::Number(Numeric::from(&n)),
            Value::String(s) => DynamicValue::Text(s),
            Value::Array(items) => DynamicValue::Sequence(items.into_iter().map(DynamicValue::from).collect()),
            Value::Object(map) => {
                DynamicValue::Mapping(map.into_iter().map(|(k, v)| (k, DynamicValue::from(v))).collect())
            }
        }
    }
}

impl From<&serde_json::Number> for Numeric {
    fn from(n: &serde_json::Number) -> Self {
        if let Some(v) = n.as_i64() {
            match i32::try_from(v) {
                Ok(small) => Numeric::Int(small),
                Err(_) => Numeric::Long(v),
            }
        } else if n.is_u64() {
            Numeric::Lazy(n.to_string())
        } else {
            n.as_f64().map(Numeric::Double).unwrap_or_else(|| Numeric::Lazy(n.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_number_kinds() {
        let value = DynamicValue::from(json!([1, 5_000_000_000i64, 18_446_744_073_709_551_615u64, 0.5]));
        assert_eq!(
            value,
            DynamicValue::Sequence(vec![
                DynamicValue::Number(Numeric::Int(1)),
                DynamicValue::Number(Numeric::Long(5_000_000_000)),
                DynamicValue::Number(Numeric::Lazy("18446744073709551615".into())),
                DynamicValue::Number(Numeric::Double(0.5)),
            ])
        );
    }

    #[test]
    fn test_to_json_roundtrip() {
        let source = json!({"text": "hi", "bold": true, "extra": [{"text": "x"}], "n": null});
        assert_eq!(DynamicValue::from(source.clone()).to_json(), source);
    }

    #[test]
    fn test_as_bool_accepts_bytes() {
        assert_eq!(DynamicValue::Bool(true).as_bool(), Some(true));
        assert_eq!(DynamicValue::Number(Numeric::Byte(0)).as_bool(), Some(false));
        assert_eq!(DynamicValue::Number(Numeric::Byte(2)).as_bool(), None);
    }
}
