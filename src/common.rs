//! Attribute primitives shared by spans and per-library configuration.
use std::borrow::Cow;
use std::fmt;

/// The key part of attribute [`KeyValue`] pairs and [`ConfigNamespace`]
/// entries.
///
/// [`ConfigNamespace`]: crate::config::ConfigNamespace
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Cow<'static, str>);

impl Key {
    /// Create a new `Key`.
    pub fn new(value: impl Into<Key>) -> Self {
        value.into()
    }

    /// Create a new const `Key`.
    pub const fn from_static_str(value: &'static str) -> Self {
        Key(Cow::Borrowed(value))
    }

    /// Create a `KeyValue` pair for `bool` values.
    pub fn bool(self, value: bool) -> KeyValue {
        KeyValue {
            key: self,
            value: Value::Bool(value),
        }
    }

    /// Create a `KeyValue` pair for `i64` values.
    pub fn i64(self, value: i64) -> KeyValue {
        KeyValue {
            key: self,
            value: Value::I64(value),
        }
    }

    /// Create a `KeyValue` pair for `f64` values.
    pub fn f64(self, value: f64) -> KeyValue {
        KeyValue {
            key: self,
            value: Value::F64(value),
        }
    }

    /// Create a `KeyValue` pair for string-like values.
    pub fn string(self, value: impl Into<Cow<'static, str>>) -> KeyValue {
        KeyValue {
            key: self,
            value: Value::String(value.into()),
        }
    }

    /// Returns a reference to the underlying key name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Key {
    fn from(key_str: &'static str) -> Self {
        Key(Cow::Borrowed(key_str))
    }
}

impl From<String> for Key {
    fn from(string: String) -> Self {
        Key(Cow::Owned(string))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmt)
    }
}

/// The value part of attribute [`KeyValue`] pairs and [`ConfigNamespace`]
/// entries.
///
/// [`ConfigNamespace`]: crate::config::ConfigNamespace
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// bool values
    Bool(bool),
    /// i64 values
    I64(i64),
    /// f64 values
    F64(f64),
    /// String values
    String(Cow<'static, str>),
    /// Homogeneous string arrays (e.g. traced command lists)
    Array(Vec<Cow<'static, str>>),
}

impl Value {
    /// Returns the contained string slice, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the contained bool, if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I64(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::String(Cow::Borrowed(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Cow::Owned(s))
    }
}

impl From<Vec<&'static str>> for Value {
    fn from(values: Vec<&'static str>) -> Self {
        Value::Array(values.into_iter().map(Cow::Borrowed).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Value::Array(values.into_iter().map(Cow::Owned).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => v.fmt(fmt),
            Value::I64(v) => v.fmt(fmt),
            Value::F64(v) => v.fmt(fmt),
            Value::String(v) => v.fmt(fmt),
            Value::Array(values) => {
                write!(fmt, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, ",")?;
                    }
                    write!(fmt, "\"{}\"", v)?;
                }
                write!(fmt, "]")
            }
        }
    }
}

/// A key-value pair describing a span attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    /// The attribute name
    pub key: Key,
    /// The attribute value
    pub value: Value,
}

impl KeyValue {
    /// Create a new `KeyValue` pair.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_construction() {
        let kv = Key::new("db.statement").string("GET mykey");
        assert_eq!(kv.key.as_str(), "db.statement");
        assert_eq!(kv.value.as_str(), Some("GET mykey"));

        let kv = KeyValue::new("retries", 3);
        assert_eq!(kv.value, Value::I64(3));
    }

    #[test]
    fn array_display() {
        let v = Value::from(vec!["get", "set"]);
        assert_eq!(v.to_string(), "[\"get\",\"set\"]");
    }
}
