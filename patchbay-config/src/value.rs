//! Typed configuration values.
//!
//! Configuration entries carry a closed `ConfigValue` union instead of raw
//! strings, so consumers never re-parse ambiguous text. The wire form is
//! tagged (`{"type": "INT", "value": 8080}`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigValue {
    Str(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Variant name as it appears on the wire.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Str(_) => "STR",
            ConfigValue::Int(_) => "INT",
            ConfigValue::Long(_) => "LONG",
            ConfigValue::Double(_) => "DOUBLE",
            ConfigValue::Bool(_) => "BOOL",
            ConfigValue::List(_) => "LIST",
            ConfigValue::Map(_) => "MAP",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view. `Str` values that parse as numbers count, so rules like
    /// a port range still apply to `"8080"`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(n) => Some(f64::from(*n)),
            ConfigValue::Long(n) => Some(*n as f64),
            ConfigValue::Double(n) => Some(*n),
            ConfigValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Element or character count for `List`/`Str`, `None` otherwise.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            ConfigValue::Str(s) => Some(s.chars().count()),
            ConfigValue::List(items) => Some(items.len()),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_string())
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        ConfigValue::Int(n)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Long(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_tagged() {
        let json = serde_json::to_value(ConfigValue::Int(8080)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "INT", "value": 8080}));

        let back: ConfigValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, ConfigValue::Int(8080));
    }

    #[test]
    fn nested_values_round_trip() {
        let value = ConfigValue::Map(BTreeMap::from([
            ("hosts".to_string(), ConfigValue::List(vec!["a".into(), "b".into()])),
            ("retries".to_string(), ConfigValue::Long(3)),
        ]));
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(serde_json::from_slice::<ConfigValue>(&bytes).unwrap(), value);
    }

    #[test]
    fn numeric_view_covers_parseable_strings() {
        assert_eq!(ConfigValue::from("8080").as_f64(), Some(8080.0));
        assert_eq!(ConfigValue::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(ConfigValue::from("localhost").as_f64(), None);
        assert_eq!(ConfigValue::Bool(true).as_f64(), None);
    }
}
