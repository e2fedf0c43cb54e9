//! Validation error types and handling

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A single failed check against one field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for programmatic handling
    pub code: String,
    /// Offending value and expected constraint, when known
    pub context: Option<serde_json::Value>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: "validation_failed".to_string(),
            context: None,
        }
    }

    /// Create a validation error with a specific code
    pub fn with_code(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
            context: None,
        }
    }

    /// Attach the offending value and the constraint it violated
    pub fn offending(mut self, value: serde_json::Value, expected: impl Into<String>) -> Self {
        self.context = Some(json!({
            "value": value,
            "expected": expected.into(),
        }));
        self
    }

    /// Set the error code
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Re-home the error under a parent field, e.g. `orders.0.` + `total`
    pub fn nested_under(mut self, parent: &str) -> Self {
        self.field = format!("{}.{}", parent, self.field);
        self
    }

    /// The offending value recorded in the context, if any
    pub fn offending_value(&self) -> Option<&serde_json::Value> {
        self.context.as_ref().and_then(|c| c.get("value"))
    }

    /// The expected constraint recorded in the context, if any
    pub fn expected(&self) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.get("expected"))
            .and_then(|e| e.as_str())
    }
}

/// Collection of validation errors keyed by field name
///
/// Produced by the collect-all entry point; ordered by field name so the
/// output is stable for UI rendering and snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<ValidationError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single validation error
    pub fn add(&mut self, error: ValidationError) {
        self.errors
            .entry(error.field.clone())
            .or_default()
            .push(error);
    }

    /// Merge another collection into this one
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of fields with errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Total number of errors across all fields
    pub fn total_errors(&self) -> usize {
        self.errors.values().map(|v| v.len()).sum()
    }

    pub fn get_field_errors(&self, field: &str) -> Option<&Vec<ValidationError>> {
        self.errors.get(field)
    }

    pub fn has_field_errors(&self, field: &str) -> bool {
        self.errors.get(field).map_or(false, |e| !e.is_empty())
    }

    /// Flatten to field name -> first message, the shape forms consume
    pub fn messages(&self) -> BTreeMap<String, String> {
        self.errors
            .iter()
            .filter_map(|(field, errors)| {
                errors
                    .first()
                    .map(|error| (field.clone(), error.message.clone()))
            })
            .collect()
    }

    /// Convert to a JSON-serializable format for API responses
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": "validation_failed",
                "message": "Validation failed",
                "fields": self.errors
            }
        })
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "No validation errors");
        }
        write!(f, "Validation failed for {} field(s):", self.errors.len())?;
        for (field, field_errors) in &self.errors {
            for error in field_errors {
                write!(f, "\n  {}: {}", field, error.message)?;
            }
        }
        Ok(())
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.add(error);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offending_context_round_trips_through_accessors() {
        let error = ValidationError::with_code("age", "age must be at most 130", "max")
            .offending(json!(200), "<= 130");

        assert_eq!(error.offending_value(), Some(&json!(200)));
        assert_eq!(error.expected(), Some("<= 130"));
        assert_eq!(error.to_string(), "age: age must be at most 130");
    }

    #[test]
    fn test_nested_under_prefixes_field() {
        let error = ValidationError::new("total", "bad").nested_under("orders.0");
        assert_eq!(error.field, "orders.0.total");
    }

    #[test]
    fn test_collection_counts_and_messages() {
        let mut errors = ValidationErrors::new();
        errors.add(ValidationError::new("email", "Invalid format"));
        errors.add(ValidationError::new("email", "Already exists"));
        errors.add(ValidationError::new("age", "Must be positive"));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.total_errors(), 3);
        assert!(errors.has_field_errors("email"));
        assert!(!errors.has_field_errors("name"));

        let messages = errors.messages();
        assert_eq!(messages["email"], "Invalid format");
        assert_eq!(messages["age"], "Must be positive");
    }

    #[test]
    fn test_merge() {
        let mut first = ValidationErrors::from(ValidationError::new("a", "one"));
        let mut second = ValidationErrors::new();
        second.add(ValidationError::new("a", "two"));
        second.add(ValidationError::new("b", "three"));

        first.merge(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.get_field_errors("a").map(Vec::len), Some(2));
    }
}
