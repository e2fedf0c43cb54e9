//! Whole-model validation: fail-fast and collect-all entry points

use super::Model;
use crate::error::{ModelError, ModelResult};
use crate::property::PropertyFlag;
use crate::validation::{ValidationError, ValidationErrors};
use crate::value::Value;

/// Field name used for failures that belong to the whole model
pub const MODEL_FIELD: &str = "_model";

impl Model {
    /// Validate the aggregate, stopping at the first failure
    ///
    /// Order: pre-validate hooks, then each property (required check before
    /// the type check, then nested children), then whole-model validators in
    /// registration order.
    pub fn validate(&mut self) -> ModelResult<()> {
        let hooks = self.properties.pre_validate_hooks().to_vec();
        for hook in hooks {
            hook(self)?;
        }

        let names: Vec<String> = self.properties.names().map(str::to_string).collect();
        for name in &names {
            self.validate_field(name)?;
        }

        let validators = self.properties.validators().to_vec();
        for validator in validators {
            validator(self)?;
        }
        Ok(())
    }

    /// Validate everything and collect failures by field instead of failing fast
    pub fn validate_all(&mut self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        let hooks = self.properties.pre_validate_hooks().to_vec();
        for hook in hooks {
            if let Err(error) = hook(self) {
                errors.add(downgrade(error, MODEL_FIELD));
            }
        }

        let names: Vec<String> = self.properties.names().map(str::to_string).collect();
        for name in &names {
            let Some(property) = self.properties.get(name) else {
                continue;
            };
            if let Err(error) = self.check_property(name) {
                errors.add(error);
                continue;
            }
            if let Some(provider) = property.provider().cloned() {
                if let Err(error) = provider.validate(self, name) {
                    errors.add(downgrade(error, name));
                }
                continue;
            }
            if let Some(value) = self.field_value_mut(name) {
                for (label, child) in child_labels(name, value) {
                    for (_, field_errors) in child.validate_all().errors {
                        for error in field_errors {
                            errors.add(error.nested_under(&label));
                        }
                    }
                }
            }
        }

        let validators = self.properties.validators().to_vec();
        for validator in validators {
            if let Err(error) = validator(self) {
                errors.add(downgrade(error, MODEL_FIELD));
            }
        }
        errors
    }

    /// Whether the model passes validation
    pub fn is_valid(&mut self) -> bool {
        self.validate().is_ok()
    }

    fn validate_field(&mut self, name: &str) -> ModelResult<()> {
        self.check_property(name)?;

        let provider = self
            .properties
            .get(name)
            .and_then(|property| property.provider().cloned());
        if let Some(provider) = provider {
            return provider.validate(self, name);
        }

        if let Some(value) = self.field_value_mut(name) {
            for (label, child) in child_labels(name, value) {
                child.validate().map_err(|error| nest(error, &label))?;
            }
        }
        Ok(())
    }

    /// Required check, then the property's own validation of its held value
    fn check_property(&self, name: &str) -> Result<(), ValidationError> {
        let Some(property) = self.properties.get(name) else {
            return Ok(());
        };
        if property.has_flag(PropertyFlag::Required) && property.is_empty() {
            return Err(ValidationError::with_code(
                name,
                format!("{} is required", name),
                "required",
            )
            .offending(property.raw_value().to_json(), "non-empty value"));
        }
        property.validate_current()
    }
}

/// Children held by a field, labelled `field` or `field.index`
pub(crate) fn child_labels<'a>(name: &str, value: &'a mut Value) -> Vec<(String, &'a mut Model)> {
    match value {
        Value::Model(child) => vec![(name.to_string(), child.as_mut())],
        Value::Array(items) => items
            .iter_mut()
            .enumerate()
            .filter_map(|(index, item)| {
                item.as_model_mut()
                    .map(|child| (format!("{}.{}", name, index), child))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Re-home a child's validation failure under the parent field
pub(crate) fn nest(error: ModelError, label: &str) -> ModelError {
    match error {
        ModelError::Validation(error) => ModelError::Validation(error.nested_under(label)),
        other => other,
    }
}

fn downgrade(error: ModelError, field: &str) -> ValidationError {
    match error {
        ModelError::Validation(error) => error,
        other => ValidationError::with_code(field, other.to_string(), "error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityConfig, FieldConfig};
    use crate::context::EntityContext;
    use crate::property::PropertyType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context(calls: Arc<AtomicUsize>) -> EntityContext {
        let context = EntityContext::new();
        context
            .register_class(
                EntityConfig::new("address")
                    .field(FieldConfig::new("city", PropertyType::String).required()),
            )
            .unwrap();
        let hook_calls = calls.clone();
        context
            .register_class(
                EntityConfig::new("customer")
                    .field(FieldConfig::new("name", PropertyType::String).required().max(10.0))
                    .field(FieldConfig::new("age", PropertyType::Integer).min(0.0))
                    .field(FieldConfig::new("home", PropertyType::Model).class("address"))
                    .pre_validate(move |model| {
                        hook_calls.fetch_add(1, Ordering::SeqCst);
                        let name = model.raw_value("name").cloned().unwrap_or_default();
                        if let Value::Str(name) = name {
                            model.set_value("name", name.trim().to_string())?;
                        }
                        Ok(())
                    })
                    .validator(|model| {
                        if model.raw_value("name") == Some(&Value::from("root")) {
                            return Err(ValidationError::new("name", "reserved name").into());
                        }
                        Ok(())
                    }),
            )
            .unwrap();
        context
    }

    #[test]
    fn test_required_fails_before_type_checks() {
        let context = context(Arc::new(AtomicUsize::new(0)));
        let mut customer = context.create_model("customer").unwrap();
        let err = customer.validate().unwrap_err();
        let validation = err.as_validation().unwrap();
        assert_eq!(validation.field, "name");
        assert_eq!(validation.code, "required");
    }

    #[test]
    fn test_pre_validate_runs_first_and_nested_errors_are_prefixed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let context = context(calls.clone());
        let mut customer = context.create_model("customer").unwrap();
        customer.set_value("name", "  Ada  ").unwrap();

        let err = customer.validate().unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(customer.raw_value("name"), Some(&Value::from("Ada")));
        assert_eq!(err.as_validation().map(|e| e.field.as_str()), Some("home.city"));
    }

    #[test]
    fn test_model_validators_run_last() {
        let context = context(Arc::new(AtomicUsize::new(0)));
        let mut customer = context.create_model("customer").unwrap();
        customer.set_value("name", "root").unwrap();
        customer
            .related_mut("home")
            .unwrap()
            .as_model_mut()
            .unwrap()
            .set_value("city", "Oslo")
            .unwrap();

        let err = customer.validate().unwrap_err();
        assert_eq!(err.as_validation().map(|e| e.message.as_str()), Some("reserved name"));

        customer.set_value("name", "Ada").unwrap();
        assert!(customer.is_valid());
    }

    #[test]
    fn test_validate_all_collects_every_field() {
        let context = context(Arc::new(AtomicUsize::new(0)));
        let mut customer = context.create_model("customer").unwrap();

        let errors = customer.validate_all();
        assert!(errors.has_field_errors("name"));
        assert!(errors.has_field_errors("home.city"));
        assert_eq!(errors.messages()["name"], "name is required");
    }
}
