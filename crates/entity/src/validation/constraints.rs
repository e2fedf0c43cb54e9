//! Bounded-value constraints for numeric, string and enumerated properties

use regex::Regex;
use serde_json::json;

use super::error::ValidationError;

/// Constraint set compiled from a field configuration
///
/// Bounds are inclusive. For strings `min`/`max` bound the character count,
/// for numbers they bound the value.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<Regex>,
    /// Allowed members for enum and set properties
    pub values: Vec<String>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn values(mut self, values: Vec<String>) -> Self {
        self.values = values;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.pattern.is_none() && self.values.is_empty()
    }

    /// Check a number against the inclusive range
    pub fn check_number(&self, field: &str, number: f64) -> Result<(), ValidationError> {
        if !number.is_finite() {
            return Err(ValidationError::with_code(
                field,
                format!("{} must be a finite number", field),
                "invalid_number",
            )
            .offending(json!(number.to_string()), "finite number"));
        }
        if let Some(min) = self.min {
            if number < min {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be at least {}", field, min),
                    "min",
                )
                .offending(json!(number), format!(">= {}", min)));
            }
        }
        if let Some(max) = self.max {
            if number > max {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be at most {}", field, max),
                    "max",
                )
                .offending(json!(number), format!("<= {}", max)));
            }
        }
        Ok(())
    }

    /// Check a string's length bounds and pattern
    ///
    /// The empty string always passes; emptiness is the required check's job.
    pub fn check_text(&self, field: &str, text: &str) -> Result<(), ValidationError> {
        if text.is_empty() {
            return Ok(());
        }
        let length = text.chars().count() as f64;
        if let Some(min) = self.min {
            if length < min {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be at least {} characters long", field, min),
                    "min_length",
                )
                .offending(json!(text), format!("length >= {}", min)));
            }
        }
        if let Some(max) = self.max {
            if length > max {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} must be at most {} characters long", field, max),
                    "max_length",
                )
                .offending(json!(text), format!("length <= {}", max)));
            }
        }
        if let Some(pattern) = &self.pattern {
            let full_match = pattern.find(text).map_or(false, |m| m.as_str() == text);
            if !full_match {
                return Err(ValidationError::with_code(
                    field,
                    format!("{} does not match the required pattern", field),
                    "pattern_mismatch",
                )
                .offending(json!(text), pattern.as_str().to_string()));
            }
        }
        Ok(())
    }

    /// Check membership in the allowed value list; an empty list allows anything
    pub fn check_choice(&self, field: &str, choice: &str) -> Result<(), ValidationError> {
        if self.values.is_empty() || self.values.iter().any(|v| v == choice) {
            return Ok(());
        }
        Err(ValidationError::with_code(
            field,
            format!("{} must be one of: {}", field, self.values.join(", ")),
            "not_in_list",
        )
        .offending(json!(choice), self.values.join("|")))
    }
}
