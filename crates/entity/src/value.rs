//! Property values - the dynamic value carried by every property slot
//!
//! `Value` is deliberately closed: every kind a `PropertyType` can hold has
//! exactly one variant, and nested records are owned `Model`s rather than
//! references so an aggregate is a plain tree.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;

use crate::model::Model;

/// Ordered field name -> value map used for records, conditions and overflow
pub type FieldMap = IndexMap<String, Value>;

/// Dynamic property value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Map(FieldMap),
    Set(BTreeSet<String>),
    Model(Box<Model>),
    /// Opaque object payload, stored and serialized as-is
    Object(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Emptiness as used by write-once checks, required checks and key lookups
    ///
    /// Zero numbers, `false`, empty strings and empty collections are empty.
    /// A nested model is never empty and neither is a date.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty(),
            Value::Date(_) => false,
            Value::Array(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::Model(_) => false,
            Value::Object(obj) => match obj {
                serde_json::Value::Null => true,
                serde_json::Value::Array(a) => a.is_empty(),
                serde_json::Value::Object(o) => o.is_empty(),
                _ => false,
            },
        }
    }

    /// Scalars cannot be mutated in place; everything else can
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::Str(_)
                | Value::Date(_)
        )
    }

    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Model(_) => "model",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of ints and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Value::Model(m) => Some(&**m),
            _ => None,
        }
    }

    pub fn as_model_mut(&mut self) -> Option<&mut Model> {
        match self {
            Value::Model(m) => Some(&mut **m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Identity rendering used for repository ids and foreign keys
    ///
    /// Returns `None` for empty values, so `0` and `""` never address a record.
    pub fn to_key_string(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        match self {
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Date(d) => Some(d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            _ => None,
        }
    }

    /// Every model held by this value: the model itself or the models in an array
    pub fn models(&self) -> Vec<&Model> {
        match self {
            Value::Model(m) => vec![m.as_ref()],
            Value::Array(items) => items.iter().filter_map(Value::as_model).collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`Value::models`]
    pub fn models_mut(&mut self) -> Vec<&mut Model> {
        match self {
            Value::Model(m) => vec![m.as_mut()],
            Value::Array(items) => items.iter_mut().filter_map(Value::as_model_mut).collect(),
            _ => Vec::new(),
        }
    }

    /// Raw JSON rendering, without any property-level normalization
    ///
    /// Nested models render their stored snapshot; no relationship is loaded.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Set(set) => serde_json::Value::Array(
                set.iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
            Value::Model(model) => Value::Map(model.snapshot()).to_json(),
            Value::Object(obj) => obj.clone(),
        }
    }

    /// Build a value from JSON; objects become maps, numbers prefer integers
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Parse the date forms accepted by date properties
///
/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC) and bare `YYYY-MM-DD`.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Str(s) => write!(f, "{}", s),
            Value::Model(model) => write!(f, "<model {}>", model.handle()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
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
        Value::Date(value)
    }
}

impl From<Model> for Value {
    fn from(value: Model) -> Self {
        Value::Model(Box::new(value))
    }
}

impl From<Vec<Model>> for Value {
    fn from(value: Vec<Model>) -> Self {
        Value::Array(value.into_iter().map(Value::from).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<FieldMap> for Value {
    fn from(value: FieldMap) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emptiness_follows_zero_values() {
        assert!(Value::Null.is_empty());
        assert!(Value::Int(0).is_empty());
        assert!(Value::Float(0.0).is_empty());
        assert!(Value::Bool(false).is_empty());
        assert!(Value::from("").is_empty());
        assert!(Value::Array(vec![]).is_empty());
        assert!(Value::Object(json!({})).is_empty());

        assert!(!Value::Int(7).is_empty());
        assert!(!Value::from("0").is_empty());
        assert!(!Value::Date(Utc::now()).is_empty());
    }

    #[test]
    fn test_key_string_skips_empty_values() {
        assert_eq!(Value::Int(0).to_key_string(), None);
        assert_eq!(Value::Null.to_key_string(), None);
        assert_eq!(Value::Int(42).to_key_string().as_deref(), Some("42"));
        assert_eq!(Value::from("abc").to_key_string().as_deref(), Some("abc"));
        assert_eq!(Value::Array(vec![Value::Int(1)]).to_key_string(), None);
    }

    #[test]
    fn test_json_conversion_prefers_integers() {
        let value = Value::from_json(&json!({"id": 3, "price": 1.5, "tags": ["a"]}));
        let Value::Map(map) = &value else {
            panic!("expected a map");
        };
        assert_eq!(map["id"], Value::Int(3));
        assert_eq!(map["price"], Value::Float(1.5));
        assert_eq!(map["tags"], Value::Array(vec![Value::from("a")]));
        assert_eq!(value.to_json(), json!({"id": 3, "price": 1.5, "tags": ["a"]}));
    }

    #[test]
    fn test_parse_date_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_date("2024-05-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_date("2024-05-01 12:30:00"), Some(expected));
        assert_eq!(
            parse_date("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_scalar_classification() {
        assert!(Value::Int(1).is_scalar());
        assert!(Value::Date(Utc::now()).is_scalar());
        assert!(!Value::Array(vec![]).is_scalar());
        assert!(!Value::Set(BTreeSet::new()).is_scalar());
        assert!(!Value::Object(json!(null)).is_scalar());
    }
}
