use std::collections::BTreeMap;
use std::fmt;

/// Generic JSON representation used when a request body has to be composed at runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Returned when a [`Value`] cannot be built or modified.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    message: String,
}

impl ValueError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValueError {}

impl Value {
    /// Converts any serializable value into a [`Value`].
    pub fn from_serializable<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self, ValueError> {
        let json = serde_json::to_value(value).map_err(|e| ValueError::new(e.to_string()))?;
        Ok(Self::from(json))
    }

    pub fn object() -> Self {
        Value::Object(BTreeMap::new())
    }

    /// Inserts (or replaces) `key` on an object value.
    pub fn add_property(&mut self, key: &str, value: Value) -> Result<(), ValueError> {
        match self {
            Value::Object(map) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            _ => Err(ValueError::new("cannot add properties to non-object value")),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            // every JSON number fits an f64, possibly with loss of precision
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_nested() {
        let json = r#"{"name":"llm","enabled":true,"temperature":0.5,"tags":["a",null],"extra":{}}"#;
        let value: Value = serde_json::from_str(json).unwrap();

        assert_eq!(value.get("name"), Some(&Value::String("llm".to_string())));
        assert_eq!(value.get("enabled").and_then(Value::as_bool), Some(true));
        assert_eq!(value.get("temperature").and_then(Value::as_f64), Some(0.5));
        assert_eq!(
            value.get("tags"),
            Some(&Value::Array(vec![Value::from("a"), Value::Null]))
        );
        assert_eq!(value.get("extra"), Some(&Value::object()));
    }

    #[test]
    fn test_add_property() {
        let mut value = Value::object();
        value.add_property("rtvi_client_version", "0.2.0".into()).unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"rtvi_client_version":"0.2.0"}"#
        );

        let mut not_an_object = Value::from(true);
        assert!(not_an_object.add_property("key", Value::Null).is_err());
    }

    #[test]
    fn test_structural_equality() {
        let a: Value = [("x", Value::from(1_i64)), ("y", Value::from("z"))]
            .into_iter()
            .collect();
        let b = Value::from(serde_json::json!({"y": "z", "x": 1}));
        assert_eq!(a, b);
    }
}
