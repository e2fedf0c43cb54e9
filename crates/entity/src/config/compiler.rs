//! Field compiler - turns a `FieldConfig` into a concrete `Property`
//!
//! Every rejection here is a configuration error: these are programmer
//! mistakes in a schema and surface when the schema is registered.

use regex::Regex;

use super::source::FieldConfig;
use crate::context::EntityContext;
use crate::error::{ModelError, ModelResult};
use crate::property::{Property, PropertyFlag, PropertyFlags, PropertyType};
use crate::validation::Constraints;
use crate::value::Value;

/// Property and prefix names: ASCII letters, digits and underscores
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn compile_field(
    context: &EntityContext,
    source: &str,
    field: &FieldConfig,
) -> ModelResult<Property> {
    let fail = |message: String| {
        ModelError::configuration(format!("{}.{}: {}", source, field.name, message))
    };

    if !is_valid_name(&field.name) {
        return Err(ModelError::configuration(format!(
            "{}: illegal field name '{}', expected [A-Za-z0-9_]+",
            source, field.name
        )));
    }

    let mut flags = field.flags;
    if flags.has(PropertyFlag::Primary) {
        flags |= PropertyFlags::NO_UPDATE | PropertyFlags::WRITE_EMPTY;
    }

    if field.kind == PropertyType::Enum && field.values.is_empty() {
        return Err(fail("enum fields need a list of values".to_string()));
    }
    if field.class.is_some() && field.kind != PropertyType::Model {
        return Err(fail(format!("class is only valid on model fields, not {}", field.kind)));
    }
    if field.relation.is_some() && !field.kind.holds_models() {
        return Err(fail(format!("relations need a model or array field, not {}", field.kind)));
    }
    if let Some(prefix) = &field.prefix {
        if !is_valid_name(prefix) {
            return Err(fail(format!("illegal prefix '{}'", prefix)));
        }
        if field.class.is_none() || field.relation.is_some() {
            return Err(fail("a prefix needs a nested model field with a class".to_string()));
        }
    }
    if let (Some(min), Some(max)) = (field.min, field.max) {
        if min > max {
            return Err(fail(format!("min {} is greater than max {}", min, max)));
        }
    }

    let mut constraints = Constraints::new().values(field.values.clone());
    constraints.min = field.min;
    constraints.max = field.max;
    if let Some(pattern) = &field.pattern {
        let anchored = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| fail(format!("invalid pattern '{}': {}", pattern, e)))?;
        constraints = constraints.pattern(anchored);
    }

    let default = match &field.default {
        Some(_) if field.kind == PropertyType::Model => {
            return Err(fail("model fields cannot take a literal default".to_string()));
        }
        Some(json) => Value::from_json(json),
        None => match field.kind.zero_value() {
            Some(zero) => zero,
            None => match field.kind {
                PropertyType::Enum => Value::Str(field.values[0].clone()),
                PropertyType::Model => match (&field.class, &field.relation) {
                    (Some(class), _) if field.relation.is_none() => {
                        Value::from(context.create_model(class).map_err(|e| fail(e.to_string()))?)
                    }
                    (_, Some(_)) => {
                        flags |= PropertyFlags::USE_NULL;
                        Value::Null
                    }
                    _ => {
                        return Err(fail("model fields need a class or a relation".to_string()));
                    }
                },
                _ => {
                    flags |= PropertyFlags::USE_NULL;
                    Value::Null
                }
            },
        },
    };

    let mut property = Property::new(&field.name, field.kind)
        .with_flags(flags)
        .with_default(default)
        .with_constraints(constraints);
    if let Some(class) = &field.class {
        property = property.with_class(class);
    }
    if let Some(prefix) = &field.prefix {
        property = property.with_prefix(prefix);
    }
    if let Some(tag) = &field.tag {
        property = property.with_tag(tag);
    }
    if let Some(provider) = &field.relation {
        property = property.with_provider(provider.clone());
    }
    for behavior in &field.behaviors {
        property = property.with_behavior(behavior.clone());
    }

    tracing::trace!("Compiled field {}.{} as {}", source, field.name, field.kind);
    Ok(property)
}
