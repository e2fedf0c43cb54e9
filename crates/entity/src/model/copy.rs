//! Copies and field-level comparison of models

use super::Model;
use crate::error::ModelResult;
use crate::property::{PropertyFlags, WriteMode};
use crate::value::Value;

/// One field that differs between two models
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    pub left: Value,
    pub right: Value,
}

impl Model {
    /// New model of the same shape carrying this model's values
    ///
    /// Write-once fields that already hold a value are not copied. When
    /// `copy_is_saveable` is set the copied values count as edits, so a save
    /// of the copy writes them. With `remove_primary_keys` the key fields are
    /// left empty and lose their primary and required flags, so saving the
    /// copy can never touch the original record; otherwise the key values
    /// are carried over as trusted data.
    pub fn create_copy(
        &self,
        copy_is_saveable: bool,
        remove_primary_keys: bool,
    ) -> ModelResult<Model> {
        let mut copy = Model::new(self.runtime.clone(), self.properties.instantiate()?);

        for property in self.properties.iter() {
            let name = property.name();
            if property.is_primary() {
                if !remove_primary_keys {
                    copy.write_field(name, property.raw_value().clone(), WriteMode::Hydrate)?;
                }
                continue;
            }
            if property.is_write_once() && !property.is_empty() {
                continue;
            }

            let mode = if copy_is_saveable {
                WriteMode::Set
            } else {
                WriteMode::Hydrate
            };
            copy.write_field(name, property.raw_value().clone(), mode)?;

            if let Some(provider) = property.provider() {
                provider.fork(self.handle, copy.handle);
            }
        }

        if remove_primary_keys {
            let keys = copy.properties.primary_keys().to_vec();
            for key in keys {
                copy.properties
                    .remove_flags(&key, PropertyFlags::PRIMARY | PropertyFlags::REQUIRED);
            }
        }

        copy.overflow = self.overflow.clone();
        tracing::debug!(
            "Copied {} model {} to {} (saveable: {}, keys removed: {})",
            self.class(),
            self.handle,
            copy.handle,
            copy_is_saveable,
            remove_primary_keys
        );
        Ok(copy)
    }

    /// Fields whose stored values differ, in this model's field order
    ///
    /// Fields only one side knows are reported against `Null`.
    pub fn diff(&self, other: &Model) -> Vec<FieldDiff> {
        let mut diffs: Vec<FieldDiff> = self
            .properties
            .iter()
            .filter_map(|property| {
                let right = other.raw_value(property.name()).cloned().unwrap_or_default();
                (property.raw_value() != &right).then(|| FieldDiff {
                    field: property.name().to_string(),
                    left: property.raw_value().clone(),
                    right,
                })
            })
            .collect();

        diffs.extend(
            other
                .properties
                .iter()
                .filter(|property| !self.properties.contains(property.name()))
                .map(|property| FieldDiff {
                    field: property.name().to_string(),
                    left: Value::Null,
                    right: property.raw_value().clone(),
                }),
        );
        diffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityConfig, FieldConfig};
    use crate::context::EntityContext;
    use crate::property::{PropertyFlag, PropertyType};

    fn context() -> EntityContext {
        let context = EntityContext::new();
        context
            .register_class(
                EntityConfig::new("invoice")
                    .field(FieldConfig::new("id", PropertyType::Integer).primary().required())
                    .field(
                        FieldConfig::new("number", PropertyType::String)
                            .flags(PropertyFlags::WRITE_EMPTY),
                    )
                    .field(FieldConfig::new("total", PropertyType::Money))
                    .field(FieldConfig::new("note", PropertyType::String)),
            )
            .unwrap();
        context
    }

    fn stored_invoice(context: &EntityContext) -> Model {
        let mut invoice = context.create_model("invoice").unwrap();
        invoice.set_value("id", 7).unwrap();
        invoice.set_value("number", "INV-7").unwrap();
        invoice.set_value("total", 120).unwrap();
        invoice.set_value("note", "first").unwrap();
        invoice.clear_edit_flags();
        invoice
    }

    #[test]
    fn test_copy_without_keys() {
        let context = context();
        let invoice = stored_invoice(&context);
        let copy = invoice.create_copy(false, true).unwrap();

        assert!(copy.id().is_empty());
        assert_ne!(copy.id(), invoice.id());
        for key in copy.properties().primary_keys() {
            let property = copy.properties().get(key).unwrap();
            assert!(!property.has_flag(PropertyFlag::Primary));
            assert!(!property.has_flag(PropertyFlag::Required));
        }
        assert_eq!(copy.raw_value("total"), Some(&Value::Int(120)));
        assert_eq!(copy.raw_value("number"), Some(&Value::from("")));
        assert!(!copy.has_edits());
    }

    #[test]
    fn test_saveable_copy_marks_edits_and_keeps_keys() {
        let context = context();
        let invoice = stored_invoice(&context);
        let copy = invoice.create_copy(true, false).unwrap();

        assert_eq!(copy.id(), Value::Int(7));
        assert!(copy.properties().get("id").unwrap().is_primary());
        assert!(copy.has_edits());
        assert!(!copy.properties().get("id").unwrap().is_edited());
        assert!(copy.properties().get("note").unwrap().is_edited());
    }

    #[test]
    fn test_diff_reports_changed_fields() {
        let context = context();
        let left = stored_invoice(&context);
        let mut right = left.clone();
        right.set_value("note", "second").unwrap();

        let diffs = left.diff(&right);
        assert_eq!(
            diffs,
            vec![FieldDiff {
                field: "note".to_string(),
                left: Value::from("first"),
                right: Value::from("second"),
            }]
        );
        assert!(left.diff(&left.clone()).is_empty());
    }
}
