//! Property Types - The closed set of value kinds a property can hold

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::validation::{Constraints, ValidationError};
use crate::value::{parse_date, Value};

/// Value kind tag of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Array,
    Enum,
    Set,
    /// Nested record owned by the parent
    Model,
    /// Monetary amount, stored as a plain number (minor units or decimal)
    Money,
    /// Opaque payload passed through untouched
    Object,
}

impl PropertyType {
    /// The value a property of this type starts from when none is configured
    ///
    /// Types without a natural zero (dates, objects, models, enums) return
    /// `None`; the compiler decides their default.
    pub fn zero_value(&self) -> Option<Value> {
        match self {
            PropertyType::String => Some(Value::Str(String::new())),
            PropertyType::Integer | PropertyType::Money => Some(Value::Int(0)),
            PropertyType::Float => Some(Value::Float(0.0)),
            PropertyType::Boolean => Some(Value::Bool(false)),
            PropertyType::Array => Some(Value::Array(Vec::new())),
            PropertyType::Set => Some(Value::Set(BTreeSet::new())),
            PropertyType::Date
            | PropertyType::Enum
            | PropertyType::Model
            | PropertyType::Object => None,
        }
    }

    /// Whether values of this type can hold child models
    pub fn holds_models(&self) -> bool {
        matches!(self, PropertyType::Model | PropertyType::Array)
    }

    /// Lenient conversion applied in the set pipeline before validation
    ///
    /// Values that cannot be converted are returned unchanged so that
    /// validation reports the mismatch with the original value.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (PropertyType::Integer, Value::Str(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Str(s),
            },
            (PropertyType::Integer, Value::Float(f))
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 =>
            {
                Value::Int(f as i64)
            }
            (PropertyType::Integer, Value::Bool(b)) => Value::Int(i64::from(b)),
            (PropertyType::Float, Value::Int(i)) => Value::Float(i as f64),
            (PropertyType::Float, Value::Str(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::Str(s),
            },
            (PropertyType::Money, Value::Str(s)) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Value::Int(i)
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    Value::Float(f)
                } else {
                    Value::Str(s)
                }
            }
            (PropertyType::Boolean, Value::Int(i)) if i == 0 || i == 1 => Value::Bool(i == 1),
            (PropertyType::Boolean, Value::Str(s)) => match s.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Value::Bool(true),
                "0" | "false" | "no" | "off" | "" => Value::Bool(false),
                _ => Value::Str(s),
            },
            (PropertyType::String, Value::Int(i)) => Value::Str(i.to_string()),
            (PropertyType::String, Value::Float(f)) => Value::Str(f.to_string()),
            (PropertyType::Date, Value::Str(s)) => match parse_date(&s) {
                Some(date) => Value::Date(date),
                None => Value::Str(s),
            },
            (PropertyType::Date, Value::Int(ts)) => match Utc.timestamp_opt(ts, 0).single() {
                Some(date) => Value::Date(date),
                None => Value::Int(ts),
            },
            (PropertyType::Enum, Value::Int(i)) => Value::Str(i.to_string()),
            (PropertyType::Set, Value::Array(items)) => {
                if items.iter().all(|item| matches!(item, Value::Str(_))) {
                    Value::Set(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                Value::Str(s) => Some(s),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Value::Array(items)
                }
            }
            (_, value) => value,
        }
    }

    /// Type-specific check of a non-null value against the constraints
    pub fn validate_value(
        &self,
        field: &str,
        value: &Value,
        constraints: &Constraints,
    ) -> Result<(), ValidationError> {
        match (self, value) {
            (_, Value::Null) => Ok(()),
            (PropertyType::String, Value::Str(s)) => constraints.check_text(field, s),
            (PropertyType::Integer, Value::Int(i)) => constraints.check_number(field, *i as f64),
            (PropertyType::Float | PropertyType::Money, Value::Float(f)) => {
                constraints.check_number(field, *f)
            }
            (PropertyType::Float | PropertyType::Money, Value::Int(i)) => {
                constraints.check_number(field, *i as f64)
            }
            (PropertyType::Boolean, Value::Bool(_)) => Ok(()),
            (PropertyType::Date, Value::Date(_)) => Ok(()),
            (PropertyType::Array, Value::Array(_)) => Ok(()),
            (PropertyType::Enum, Value::Str(s)) => constraints.check_choice(field, s),
            (PropertyType::Set, Value::Set(members)) => members
                .iter()
                .try_for_each(|member| constraints.check_choice(field, member)),
            (PropertyType::Model, Value::Model(_)) => Ok(()),
            (PropertyType::Object, Value::Object(_) | Value::Map(_) | Value::Array(_)) => Ok(()),
            (expected, actual) => Err(ValidationError::with_code(
                field,
                format!(
                    "{} must be of type {}, got {}",
                    field,
                    expected,
                    actual.type_name()
                ),
                "invalid_type",
            )
            .offending(actual.to_json(), expected.to_string())),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Float => "float",
            PropertyType::Boolean => "boolean",
            PropertyType::Date => "date",
            PropertyType::Array => "array",
            PropertyType::Enum => "enum",
            PropertyType::Set => "set",
            PropertyType::Model => "model",
            PropertyType::Money => "money",
            PropertyType::Object => "object",
        };
        write!(f, "{}", name)
    }
}
