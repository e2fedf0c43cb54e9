//! Assertion helpers for models, validation failures and serialized output

use elif_entity::{Model, ModelError, Value};
use serde_json::Value as JsonValue;

use crate::{TestError, TestResult};

/// Collection of entity assertions
pub struct EntityAssertions;

impl EntityAssertions {
    /// Assert that a model's stored value for `field` equals `expected`
    pub fn assert_field(model: &Model, field: &str, expected: impl Into<Value>) -> TestResult<()> {
        let expected = expected.into();
        let actual = model.raw_value(field).cloned().unwrap_or_default();
        if actual != expected {
            return Err(TestError::Assertion {
                message: format!(
                    "{}.{}: expected {:?}, got {:?}",
                    model.class(),
                    field,
                    expected,
                    actual
                ),
            });
        }
        Ok(())
    }

    /// Assert that an error is a validation failure for `field` with `code`
    pub fn assert_validation_error(error: &ModelError, field: &str, code: &str) -> TestResult<()> {
        let Some(validation) = error.as_validation() else {
            return Err(TestError::Assertion {
                message: format!("expected a validation error, got {}", error),
            });
        };
        if validation.field != field || validation.code != code {
            return Err(TestError::Assertion {
                message: format!(
                    "expected {} failure on {}, got {} on {}",
                    code, field, validation.code, validation.field
                ),
            });
        }
        Ok(())
    }

    /// Assert that JSON contains expected fields/values
    pub fn assert_json_contains(actual: &JsonValue, expected: &JsonValue) -> TestResult<()> {
        if !json_contains(actual, expected) {
            return Err(TestError::Assertion {
                message: format!(
                    "JSON does not contain expected values:\nExpected to contain: {}\nActual: {}",
                    serde_json::to_string_pretty(expected).unwrap_or_default(),
                    serde_json::to_string_pretty(actual).unwrap_or_default()
                ),
            });
        }
        Ok(())
    }

    /// Assert that the models hold exactly these ids, in order
    pub fn assert_ids(models: &[&Model], expected: &[&str]) -> TestResult<()> {
        let actual: Vec<String> = models
            .iter()
            .map(|model| model.id().to_key_string().unwrap_or_default())
            .collect();
        if actual != expected {
            return Err(TestError::Assertion {
                message: format!("expected ids {:?}, got {:?}", expected, actual),
            });
        }
        Ok(())
    }
}

/// Whether every key of `expected` is present in `actual` with a matching value
fn json_contains(actual: &JsonValue, expected: &JsonValue) -> bool {
    match (actual, expected) {
        (JsonValue::Object(actual), JsonValue::Object(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).map_or(false, |found| json_contains(found, value))),
        (JsonValue::Array(actual), JsonValue::Array(expected)) => {
            actual.len() == expected.len()
                && actual.iter().zip(expected).all(|(a, e)| json_contains(a, e))
        }
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_contains_is_recursive() {
        let actual = json!({"id": 1, "billing_city": "Oslo", "lines": [{"sku": "A", "id": 4}]});
        let nested = json!({"lines": [{"sku": "A"}]});
        assert!(EntityAssertions::assert_json_contains(&actual, &nested).is_ok());
        assert!(EntityAssertions::assert_json_contains(&actual, &json!({"id": 2})).is_err());
        let missing = json!({"missing": null});
        assert!(EntityAssertions::assert_json_contains(&actual, &missing).is_err());
    }

    #[test]
    fn test_validation_error_assertion() {
        let error: ModelError =
            elif_entity::ValidationError::with_code("sku", "sku is required", "required").into();
        assert!(EntityAssertions::assert_validation_error(&error, "sku", "required").is_ok());
        assert!(EntityAssertions::assert_validation_error(&error, "sku", "null").is_err());
        let other = ModelError::Relationship("x".into());
        assert!(EntityAssertions::assert_validation_error(&other, "sku", "required").is_err());
    }
}
