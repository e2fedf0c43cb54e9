//! Error types for the entity layer
//!
//! Validation failures carry the offending field; configuration errors are
//! programmer errors raised while compiling schemas or wiring providers;
//! `NotFound` is passed through untouched from the repository.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Error types for entity operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Business-rule, type or required-field failure
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed schema or provider setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Relationship resolution or reconciliation failed
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// Failure reported by the repository collaborator
    #[error("Repository error: {0}")]
    Repository(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ModelError::Configuration(message.into())
    }

    /// The validation error carried by this error, if it is one
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ModelError::Validation(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ModelError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound(_))
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ModelError {
    fn from(err: serde_yaml::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<regex::Error> for ModelError {
    fn from(err: regex::Error) -> Self {
        ModelError::Configuration(format!("invalid pattern: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_keep_their_field() {
        let error: ModelError = ValidationError::new("email", "is required").into();
        assert!(error.is_validation());
        assert_eq!(error.as_validation().map(|e| e.field.as_str()), Some("email"));
        assert_eq!(error.to_string(), "Validation error: email: is required");
    }

    #[test]
    fn test_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(ModelError::from(json_err), ModelError::Serialization(_)));

        let regex_err = regex::Regex::new("(").unwrap_err();
        assert!(matches!(ModelError::from(regex_err), ModelError::Configuration(_)));

        assert!(ModelError::NotFound("orders/9".into()).is_not_found());
    }
}
