//! Model - The aggregate entity built on a PropertySet
//!
//! A model owns its property set exclusively, tracks edits per property and
//! keeps values for unknown field names in an overflow map. Fields with a
//! registered prefix forward to the nested child model; relation fields are
//! resolved through their provider on every read.

pub mod copy;
pub mod serialize;
pub mod validate;

use std::fmt;
use std::sync::Arc;

use crate::config::EntitySettings;
use crate::context::{ModelHandle, ModelRuntime};
use crate::error::{ModelError, ModelResult};
use crate::property::{AccessContext, PropertyFlag, PropertySet, WriteMode};
use crate::relationships::SavePlan;
use crate::repository::Repository;
use crate::value::{FieldMap, Value};

pub use copy::FieldDiff;
pub use serialize::ToArrayOptions;

/// Aggregate record instance
pub struct Model {
    handle: ModelHandle,
    runtime: Arc<ModelRuntime>,
    properties: PropertySet,
    overflow: FieldMap,
}

impl Model {
    pub(crate) fn new(runtime: Arc<ModelRuntime>, properties: PropertySet) -> Self {
        let handle = runtime.allocate();
        tracing::trace!("Created {} model {}", properties.name(), handle);
        Self {
            handle,
            runtime,
            properties,
            overflow: FieldMap::new(),
        }
    }

    /// Identity used by relationship caches, unique for the model's lifetime
    pub fn handle(&self) -> ModelHandle {
        self.handle
    }

    /// Name of the class (property set) this model was built from
    pub fn class(&self) -> &str {
        self.properties.name()
    }

    pub fn settings(&self) -> &EntitySettings {
        self.runtime.settings()
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertySet {
        &mut self.properties
    }

    /// Values set against names the schema does not know
    pub fn overflow(&self) -> &FieldMap {
        &self.overflow
    }

    /// Read a field through providers and getter behaviors
    pub fn get_value(&mut self, name: &str, context: AccessContext) -> ModelResult<Value> {
        if let Some(value) = self.overflow.get(name) {
            return Ok(value.clone());
        }

        let Some(property) = self.properties.get(name) else {
            return match self.route(name) {
                Some((delegate, rest)) => match self.child_mut(&delegate) {
                    Some(child) => {
                        tracing::trace!("Routing read of {} to {}.{}", name, delegate, rest);
                        child.get_value(&rest, context)
                    }
                    None => Ok(Value::Null),
                },
                None => Ok(Value::Null),
            };
        };

        let value = match property.provider().cloned() {
            Some(provider) => provider.resolve(self, name, None, context)?,
            None => property.raw_value().clone(),
        };

        let property = self
            .properties
            .get(name)
            .ok_or_else(|| ModelError::Relationship(format!("{} vanished during read", name)))?;
        let mut value = property.apply_getters(value, context);
        for getter in property.model_getters() {
            value = getter(self, value, context)?;
        }
        Ok(value)
    }

    /// Plain application read
    pub fn get(&mut self, name: &str) -> ModelResult<Value> {
        self.get_value(name, AccessContext::Read)
    }

    /// Write a field; unknown names land in the overflow map
    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();

        let Some(property) = self.properties.get(name) else {
            if let Some((delegate, rest)) = self.route(name) {
                if let Some(child) = self.child_mut(&delegate) {
                    tracing::trace!("Routing write of {} to {}.{}", name, delegate, rest);
                    return child.set_value(&rest, value);
                }
            }
            if self.settings().warn_on_overflow {
                tracing::warn!("Unknown field {} on {} stored as overflow", name, self.class());
            } else {
                tracing::trace!("Unknown field {} on {} stored as overflow", name, self.class());
            }
            self.overflow.insert(name.to_string(), value);
            return Ok(());
        };

        let setters = property.model_setters();
        let provider = property.provider().cloned();
        let mut value = value;
        for setter in setters {
            value = setter(self, value)?;
        }

        match provider {
            Some(provider) => {
                provider.resolve(self, name, Some(value), AccessContext::Read)?;
                Ok(())
            }
            None => self.write_field(name, value, WriteMode::Set),
        }
    }

    /// Write several fields in order, stopping at the first failure
    pub fn set_values(&mut self, values: FieldMap) -> ModelResult<()> {
        for (name, value) in values {
            self.set_value(&name, value)?;
        }
        Ok(())
    }

    /// Populate from a trusted source: no write rules, no edit marks
    ///
    /// Prefixed names are routed to children; unknown names go to overflow.
    pub fn hydrate(&mut self, values: FieldMap) -> ModelResult<()> {
        for (name, value) in values {
            if self.properties.contains(&name) {
                self.write_field(&name, value, WriteMode::Hydrate)?;
                continue;
            }
            if let Some((delegate, rest)) = self.route(&name) {
                if let Some(child) = self.child_mut(&delegate) {
                    child.hydrate(FieldMap::from([(rest, value)]))?;
                    continue;
                }
            }
            self.overflow.insert(name, value);
        }
        Ok(())
    }

    /// Write straight into a property, skipping model setters and providers
    pub(crate) fn write_field(
        &mut self,
        name: &str,
        value: Value,
        mode: WriteMode,
    ) -> ModelResult<()> {
        let class = self.class().to_string();
        let property = self
            .properties
            .get_property_mut(name)
            .ok_or_else(|| ModelError::configuration(format!("{} has no field {}", class, name)))?;
        property.write(value, mode)
    }

    /// Trusted write that still counts as an edit
    pub(crate) fn assign(&mut self, name: &str, value: Value) -> ModelResult<()> {
        let class = self.class().to_string();
        let property = self
            .properties
            .get_property_mut(name)
            .ok_or_else(|| ModelError::configuration(format!("{} has no field {}", class, name)))?;
        property.write(value, WriteMode::Hydrate)?;
        property.mark_edited();
        Ok(())
    }

    pub(crate) fn field_value_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.properties
            .get_property_mut(name)
            .map(|property| property.raw_value_mut())
    }

    /// Stored value without getters or provider resolution
    pub fn raw_value(&self, name: &str) -> Option<&Value> {
        match self.properties.get_property(name) {
            Some(property) => Some(property.raw_value()),
            None => self.overflow.get(name),
        }
    }

    /// Resolve a relation field and borrow the stored value for in-place edits
    pub fn related_mut(&mut self, name: &str) -> ModelResult<&mut Value> {
        let provider = self
            .properties
            .get(name)
            .and_then(|property| property.provider().cloned());
        if let Some(provider) = provider {
            provider.resolve(self, name, None, AccessContext::Read)?;
        }
        let class = self.class().to_string();
        self.field_value_mut(name)
            .ok_or_else(|| ModelError::configuration(format!("{} has no field {}", class, name)))
    }

    /// Value of the primary key, `Null` when the schema has none
    pub fn id(&self) -> Value {
        self.properties
            .primary_property()
            .map(|property| property.raw_value().clone())
            .unwrap_or_default()
    }

    /// Whether the primary key is still empty
    pub fn is_new(&self) -> bool {
        self.id().is_empty()
    }

    /// Back to defaults: every property reset, overflow and relation caches dropped
    pub fn reset(&mut self) -> ModelResult<()> {
        self.release_relations();
        self.overflow.clear();
        for property in self.properties.iter_mut() {
            property.reset()?;
        }
        Ok(())
    }

    /// Names that are edited or hold a mutable aggregate value
    pub fn modified_properties(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|property| {
                let value = property.raw_value();
                property.is_edited() || (!value.is_null() && !value.is_scalar())
            })
            .map(|property| property.name().to_string())
            .collect()
    }

    pub fn has_edits(&self) -> bool {
        self.properties.iter().any(|property| property.is_edited())
    }

    /// Forget all dirty state, in this model and every child it holds
    pub fn clear_edit_flags(&mut self) {
        for property in self.properties.iter_mut() {
            property.clear_edit_flag();
            for child in property.raw_value_mut().models_mut() {
                child.clear_edit_flags();
            }
        }
    }

    /// Edited scalar values, keyed by field name
    pub fn edited_values(&self) -> FieldMap {
        self.properties
            .iter()
            .filter(|property| property.is_edited() && property.provider().is_none())
            .map(|property| (property.name().to_string(), property.raw_value().clone()))
            .collect()
    }

    /// Every storable value, for an insert
    pub fn insert_values(&self) -> FieldMap {
        self.snapshot()
    }

    /// Modified storable values minus fields that are fixed after insert
    ///
    /// Flattened child columns follow the child's own edit state.
    pub fn update_values(&self) -> FieldMap {
        let mut changed = self.modified_properties();
        for property in self.properties.iter() {
            if let (Some(prefix), Value::Model(child)) = (property.prefix(), property.raw_value()) {
                changed.extend(
                    child
                        .update_values()
                        .into_keys()
                        .map(|name| format!("{}{}", prefix, name)),
                );
            }
        }
        self.snapshot()
            .into_iter()
            .filter(|(name, _)| {
                let fixed = self
                    .properties
                    .get(name)
                    .map_or(false, |property| property.has_flag(PropertyFlag::NoUpdate));
                !fixed && changed.iter().any(|c| c == name)
            })
            .collect()
    }

    /// Raw storable field map: relation fields left out, prefixed children flattened
    pub fn snapshot(&self) -> FieldMap {
        let mut out = FieldMap::new();
        for property in self.properties.iter() {
            if property.provider().is_some() {
                continue;
            }
            match (property.prefix(), property.raw_value()) {
                (Some(prefix), Value::Model(child)) => {
                    for (name, value) in child.snapshot() {
                        out.insert(format!("{}{}", prefix, name), value);
                    }
                }
                (_, Value::Model(child)) => {
                    out.insert(property.name().to_string(), Value::Map(child.snapshot()));
                }
                (_, value) => {
                    out.insert(property.name().to_string(), value.clone());
                }
            }
        }
        out
    }

    /// Persist the aggregate through its save plan
    pub fn save(&mut self, repository: &dyn Repository) -> ModelResult<()> {
        let plan = SavePlan::for_aggregate(self, repository)?;
        plan.execute(self)
    }

    /// Delete what a relation field points at; never implicit
    pub fn delete_related(&mut self, name: &str) -> ModelResult<usize> {
        let provider = self
            .properties
            .get(name)
            .and_then(|property| property.provider().cloned())
            .ok_or_else(|| ModelError::configuration(format!("{} is not a relation field", name)))?;
        provider.delete_related(self, name)
    }

    fn route(&self, name: &str) -> Option<(String, String)> {
        self.properties
            .resolve_prefix(name)
            .map(|(delegate, rest)| (delegate.to_string(), rest.to_string()))
    }

    fn child_mut(&mut self, delegate: &str) -> Option<&mut Model> {
        self.properties
            .get_mut(delegate)
            .and_then(|property| property.raw_value_mut().as_model_mut())
    }

    fn release_relations(&self) {
        for property in self.properties.iter() {
            if let Some(provider) = property.provider() {
                provider.release(self.handle);
            }
        }
    }
}

impl Clone for Model {
    /// The copy gets its own handle and inherits the relation cache state
    fn clone(&self) -> Self {
        let handle = self.runtime.allocate();
        for property in self.properties.iter() {
            if let Some(provider) = property.provider() {
                provider.fork(self.handle, handle);
            }
        }
        Self {
            handle,
            runtime: self.runtime.clone(),
            properties: self.properties.clone(),
            overflow: self.overflow.clone(),
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.release_relations();
    }
}

/// Models are equal when they hold the same values; handles are ignored
impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.class() == other.class()
            && self.overflow == other.overflow
            && self.properties.len() == other.properties.len()
            && self.properties.iter().all(|property| {
                other
                    .properties
                    .get(property.name())
                    .map_or(false, |theirs| theirs.raw_value() == property.raw_value())
            })
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: FieldMap = self
            .properties
            .iter()
            .map(|property| (property.name().to_string(), property.raw_value().clone()))
            .collect();
        f.debug_struct("Model")
            .field("class", &self.class())
            .field("handle", &self.handle)
            .field("values", &values)
            .field("overflow", &self.overflow)
            .finish()
    }
}
