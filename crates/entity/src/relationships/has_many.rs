//! HasMany Relationship - parent model holds a list of child records
//!
//! Children are found by their foreign key pointing at the parent's key.
//! They are loaded lazily, once per parent key, and saved after the parent
//! so the key can be copied onto them. Children that were stored for the
//! parent but are no longer held are removed on save unless delete
//! management is switched off.

use std::fmt;
use std::sync::Arc;

use super::identity::{Claim, IdentityCache};
use super::reconcile::{orphan_ids, SaveOrder, SavePhase, SavePlan};
use super::traits::{RelationKind, RelationshipProvider};
use crate::config::ModelHook;
use crate::context::ModelHandle;
use crate::error::{ModelError, ModelResult};
use crate::model::validate::{child_labels, nest};
use crate::model::Model;
use crate::property::{AccessContext, WriteMode};
use crate::repository::Repository;
use crate::value::{FieldMap, Value};

/// How a has-many field finds and saves its children
#[derive(Clone)]
pub struct HasManyConfig {
    /// Field on the child holding the parent's key
    pub foreign_key: String,
    /// Field on the parent the foreign key points at; the parent's primary key when unset
    pub local_key: Option<String>,
    /// Extra equality conditions applied to every load
    pub conditions: FieldMap,
    pub limit: Option<usize>,
    /// Remove stored children that are no longer held when the parent saves
    pub manage_deletes: bool,
    /// Runs on the parent before the children are saved
    pub before_save: Option<ModelHook>,
    /// Runs on the parent after the children are saved
    pub after_save: Option<ModelHook>,
}

impl HasManyConfig {
    pub fn new(foreign_key: impl Into<String>) -> Self {
        Self {
            foreign_key: foreign_key.into(),
            local_key: None,
            conditions: FieldMap::new(),
            limit: None,
            manage_deletes: true,
            before_save: None,
            after_save: None,
        }
    }

    pub fn local_key(mut self, name: impl Into<String>) -> Self {
        self.local_key = Some(name.into());
        self
    }

    pub fn condition(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(name.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn manage_deletes(mut self, manage: bool) -> Self {
        self.manage_deletes = manage;
        self
    }

    pub fn before_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Model) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.before_save = Some(Arc::new(hook));
        self
    }

    pub fn after_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Model) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.after_save = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for HasManyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasManyConfig")
            .field("foreign_key", &self.foreign_key)
            .field("local_key", &self.local_key)
            .field("conditions", &self.conditions)
            .field("limit", &self.limit)
            .field("manage_deletes", &self.manage_deletes)
            .field("before_save", &self.before_save.is_some())
            .field("after_save", &self.after_save.is_some())
            .finish()
    }
}

/// Provider for one has-many field
pub struct HasManyProvider {
    repository: Arc<dyn Repository>,
    config: HasManyConfig,
    /// Primary key of the child records
    child_key: String,
    cache: Arc<IdentityCache>,
}

impl HasManyProvider {
    /// Check the child schema and build the provider
    ///
    /// Children must have exactly one primary key and a field named by
    /// `foreign_key`.
    pub fn new(repository: Arc<dyn Repository>, config: HasManyConfig) -> ModelResult<Self> {
        let blueprint = repository.create_property_set()?;
        let child_key = match blueprint.primary_keys() {
            [key] => key.clone(),
            [] => {
                return Err(ModelError::configuration(format!(
                    "has-many target {} has no primary key",
                    blueprint.name()
                )))
            }
            keys => {
                return Err(ModelError::configuration(format!(
                    "has-many target {} has a compound primary key ({}); \
                     only single keys are supported",
                    blueprint.name(),
                    keys.join(", ")
                )))
            }
        };
        if !blueprint.contains(&config.foreign_key) {
            return Err(ModelError::configuration(format!(
                "has-many target {} has no foreign key field {}",
                blueprint.name(),
                config.foreign_key
            )));
        }

        tracing::debug!(
            "Registered has-many on {} via {} (key {})",
            blueprint.name(),
            config.foreign_key,
            child_key
        );
        Ok(Self {
            repository,
            config,
            child_key,
            cache: Arc::new(IdentityCache::new()),
        })
    }

    pub fn config(&self) -> &HasManyConfig {
        &self.config
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Primary key name of the child records
    pub fn child_key(&self) -> &str {
        &self.child_key
    }

    fn local_key_name(&self, parent: &Model) -> ModelResult<String> {
        match &self.config.local_key {
            Some(name) => Ok(name.clone()),
            None => parent
                .properties()
                .primary_key()
                .map(str::to_string)
                .ok_or_else(|| {
                    ModelError::configuration(format!(
                        "{} has a has-many field but no primary key",
                        parent.class()
                    ))
                }),
        }
    }

    /// Parent key value and its string form; `None` while the key is empty
    fn parent_key(&self, parent: &Model) -> ModelResult<(Value, Option<String>)> {
        let name = self.local_key_name(parent)?;
        let value = parent.raw_value(&name).cloned().unwrap_or_default();
        let key = if value.is_empty() {
            None
        } else {
            value.to_key_string()
        };
        Ok((value, key))
    }

    /// Turn a caller-supplied value into a list of child models
    fn normalize(&self, supplied: Value) -> ModelResult<Vec<Value>> {
        match supplied {
            Value::Null => Ok(Vec::new()),
            Value::Model(child) => Ok(vec![Value::Model(child)]),
            Value::Map(data) => Ok(vec![Value::from(self.repository.create(&data)?)]),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Model(child) => Ok(Value::Model(child)),
                    Value::Map(data) => Ok(Value::from(self.repository.create(&data)?)),
                    other => Err(ModelError::Relationship(format!(
                        "has-many items must be models or maps, got {}",
                        other.type_name()
                    ))),
                })
                .collect(),
            other => Err(ModelError::Relationship(format!(
                "has-many value must be a list, a model or a map, got {}",
                other.type_name()
            ))),
        }
    }

    fn child_ids(&self, value: Option<&Value>) -> Vec<String> {
        value
            .map(|value| {
                value
                    .models()
                    .into_iter()
                    .filter_map(|child| {
                        child
                            .raw_value(&self.child_key)
                            .and_then(Value::to_key_string)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn held(parent: &Model, field: &str) -> Value {
    parent.raw_value(field).cloned().unwrap_or_default()
}

impl RelationshipProvider for HasManyProvider {
    fn kind(&self) -> RelationKind {
        RelationKind::HasMany
    }

    fn resolve(
        &self,
        parent: &mut Model,
        field: &str,
        supplied: Option<Value>,
        _context: AccessContext,
    ) -> ModelResult<Value> {
        let (key_value, key) = self.parent_key(parent)?;
        let handle = parent.handle();

        if let Some(supplied) = supplied {
            let children = self.normalize(supplied)?;
            tracing::debug!(
                "Override of {}.{} on {} with {} records",
                parent.class(),
                field,
                handle,
                children.len()
            );
            parent.write_field(field, Value::Array(children), WriteMode::Set)?;
            self.cache.mark_overridden(handle, key);
            return Ok(held(parent, field));
        }

        let Some(key) = key else {
            return Ok(held(parent, field));
        };

        match self.cache.claim(handle, &key, false) {
            Claim::Cached => {}
            Claim::Busy => {
                tracing::warn!(
                    "Re-entrant load of {}.{} on {}; returning the held value",
                    parent.class(),
                    field,
                    handle
                );
            }
            Claim::Load { previous } => {
                let mut conditions = self.config.conditions.clone();
                conditions.insert(self.config.foreign_key.clone(), key_value);
                tracing::debug!(
                    "Loading {}.{} for {} where {} = {}",
                    parent.class(),
                    field,
                    handle,
                    self.config.foreign_key,
                    key
                );
                let loaded = self
                    .repository
                    .find_by_properties(&conditions, self.config.limit)
                    .and_then(|children| {
                        parent.write_field(field, Value::from(children), WriteMode::Hydrate)
                    });
                match loaded {
                    Ok(()) => self.cache.finish(handle),
                    Err(error) => {
                        self.cache.restore(handle, previous);
                        return Err(error);
                    }
                }
            }
        }
        Ok(held(parent, field))
    }

    fn validate(&self, parent: &mut Model, field: &str) -> ModelResult<()> {
        if let Some(value) = parent.field_value_mut(field) {
            for (label, child) in child_labels(field, value) {
                child.validate().map_err(|error| nest(error, &label))?;
            }
        }
        Ok(())
    }

    fn save_plan(&self, parent: &Model, field: &str) -> ModelResult<SavePlan> {
        let local_key = self.local_key_name(parent)?;
        let mut plan = SavePlan::new(SaveOrder::AfterParent);

        let (name, key_name, foreign_key) = (
            field.to_string(),
            local_key.clone(),
            self.config.foreign_key.clone(),
        );
        let label = format!("{}: assign {}", field, foreign_key);
        plan = plan.step(SavePhase::Before, label, move |parent| {
            let parent_id = parent.raw_value(&key_name).cloned().unwrap_or_default();
            if parent_id.is_empty() {
                return Err(ModelError::Relationship(format!(
                    "cannot save {}.{} before the parent has a {}",
                    parent.class(),
                    name,
                    key_name
                )));
            }
            if let Some(value) = parent.field_value_mut(&name) {
                for child in value.models_mut() {
                    if child.raw_value(&foreign_key).map_or(true, Value::is_empty) {
                        child.assign(&foreign_key, parent_id.clone())?;
                    }
                }
            }
            Ok(())
        });

        if let Some(hook) = self.config.before_save.clone() {
            plan = plan.step(SavePhase::Before, format!("{}: before save", field), move |parent| {
                hook(parent)
            });
        }

        let (name, repository) = (field.to_string(), self.repository.clone());
        plan = plan.step(SavePhase::Main, format!("{}: save children", field), move |parent| {
            if let Some(value) = parent.field_value_mut(&name) {
                for child in value.models_mut() {
                    SavePlan::for_aggregate(child, repository.as_ref())?.execute(child)?;
                }
            }
            Ok(())
        });

        if self.config.manage_deletes {
            let (name, key_name, foreign_key, child_key, repository) = (
                field.to_string(),
                local_key.clone(),
                self.config.foreign_key.clone(),
                self.child_key.clone(),
                self.repository.clone(),
            );
            plan = plan.step(SavePhase::After, format!("{}: remove orphans", field), move |parent| {
                let parent_key = parent
                    .raw_value(&key_name)
                    .and_then(Value::to_key_string)
                    .ok_or_else(|| {
                        ModelError::Relationship(format!(
                            "{} has no {} after save",
                            parent.class(),
                            key_name
                        ))
                    })?;
                let existing = repository.get_ids_for_property(&foreign_key, &parent_key)?;
                let current: Vec<String> = parent
                    .raw_value(&name)
                    .map(|value| {
                        value
                            .models()
                            .into_iter()
                            .filter_map(|child| {
                                child.raw_value(&child_key).and_then(Value::to_key_string)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let orphans = orphan_ids(&existing, &current);
                for id in &orphans {
                    repository.remove_by_id(id)?;
                }
                if !orphans.is_empty() {
                    tracing::debug!(
                        "Removed {} orphaned {} records of {}",
                        orphans.len(),
                        name,
                        parent.handle()
                    );
                }
                Ok(())
            });
        }

        if let Some(hook) = self.config.after_save.clone() {
            plan = plan.step(SavePhase::After, format!("{}: after save", field), move |parent| {
                hook(parent)
            });
        }

        let (cache, key_name) = (self.cache.clone(), local_key);
        plan = plan.step(SavePhase::After, format!("{}: settle", field), move |parent| {
            let key = parent.raw_value(&key_name).and_then(Value::to_key_string);
            cache.settle(parent.handle(), key);
            Ok(())
        });

        Ok(plan)
    }

    fn delete_related(&self, parent: &mut Model, field: &str) -> ModelResult<usize> {
        self.resolve(parent, field, None, AccessContext::Persist)?;
        let ids = self.child_ids(parent.raw_value(field));
        for id in &ids {
            self.repository.remove_by_id(id)?;
        }
        parent.write_field(field, Value::Array(Vec::new()), WriteMode::Hydrate)?;
        let (_, key) = self.parent_key(parent)?;
        self.cache.settle(parent.handle(), key);
        tracing::debug!("Deleted {} {} records of {}", ids.len(), field, parent.handle());
        Ok(ids.len())
    }

    fn release(&self, handle: ModelHandle) {
        self.cache.release(handle);
    }

    fn fork(&self, from: ModelHandle, to: ModelHandle) {
        self.cache.fork(from, to);
    }
}

impl fmt::Debug for HasManyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasManyProvider")
            .field("config", &self.config)
            .field("child_key", &self.child_key)
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityConfig, FieldConfig};
    use crate::context::EntityContext;
    use crate::property::{PropertySet, PropertyType};
    use crate::relationships::SaveStep;

    /// Repository that only knows its schema
    struct SchemaOnly {
        context: EntityContext,
        class: String,
    }

    impl SchemaOnly {
        fn new(config: EntityConfig) -> Arc<Self> {
            let context = EntityContext::new();
            let class = config.name.clone();
            context.register_class(config).unwrap();
            Arc::new(Self { context, class })
        }
    }

    impl Repository for SchemaOnly {
        fn create(&self, data: &FieldMap) -> ModelResult<Model> {
            let mut model = self.context.create_model(&self.class)?;
            model.hydrate(data.clone())?;
            Ok(model)
        }
        fn get(&self, id: &str) -> ModelResult<Model> {
            Err(ModelError::NotFound(id.to_string()))
        }
        fn find_by_properties(&self, _: &FieldMap, _: Option<usize>) -> ModelResult<Vec<Model>> {
            Ok(Vec::new())
        }
        fn remove_by_id(&self, _: &str) -> ModelResult<()> {
            Ok(())
        }
        fn get_ids_for_property(&self, _: &str, _: &str) -> ModelResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn get_save_function(
            &self,
            _: Option<ModelHook>,
            _: Option<ModelHook>,
        ) -> ModelResult<Vec<SaveStep>> {
            Ok(Vec::new())
        }
        fn create_property_set(&self) -> ModelResult<PropertySet> {
            self.context
                .class(&self.class)
                .map(|set| (*set).clone())
                .ok_or_else(|| ModelError::configuration("missing class"))
        }
    }

    fn line_schema() -> EntityConfig {
        EntityConfig::new("line")
            .field(FieldConfig::new("id", PropertyType::Integer).primary())
            .field(FieldConfig::new("order_id", PropertyType::Integer))
            .field(FieldConfig::new("sku", PropertyType::String))
    }

    #[test]
    fn test_child_schema_needs_single_key_and_foreign_key() {
        let provider =
            HasManyProvider::new(SchemaOnly::new(line_schema()), HasManyConfig::new("order_id"))
                .unwrap();
        assert_eq!(provider.child_key(), "id");
        assert_eq!(provider.kind(), RelationKind::HasMany);

        let err =
            HasManyProvider::new(SchemaOnly::new(line_schema()), HasManyConfig::new("cart_id"))
                .unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));

        let keyless =
            EntityConfig::new("tag").field(FieldConfig::new("order_id", PropertyType::Integer));
        assert!(
            HasManyProvider::new(SchemaOnly::new(keyless), HasManyConfig::new("order_id")).is_err()
        );

        let compound = EntityConfig::new("pair")
            .field(FieldConfig::new("a", PropertyType::Integer).primary())
            .field(FieldConfig::new("b", PropertyType::Integer).primary())
            .field(FieldConfig::new("order_id", PropertyType::Integer));
        let err = HasManyProvider::new(SchemaOnly::new(compound), HasManyConfig::new("order_id"))
            .unwrap_err();
        assert!(err.to_string().contains("compound"));
    }

    #[test]
    fn test_normalize_accepts_models_maps_and_null() {
        let repo = SchemaOnly::new(line_schema());
        let provider = HasManyProvider::new(repo.clone(), HasManyConfig::new("order_id")).unwrap();

        assert!(provider.normalize(Value::Null).unwrap().is_empty());

        let map = FieldMap::from([("sku".to_string(), Value::from("A-1"))]);
        let one = provider.normalize(Value::Map(map.clone())).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].as_model().and_then(|m| m.raw_value("sku")), Some(&Value::from("A-1")));

        let model = repo.create(&FieldMap::new()).unwrap();
        let many = provider
            .normalize(Value::Array(vec![Value::Map(map), Value::from(model)]))
            .unwrap();
        assert_eq!(many.len(), 2);

        assert!(matches!(
            provider.normalize(Value::from(3)),
            Err(ModelError::Relationship(_))
        ));
        assert!(provider.normalize(Value::Array(vec![Value::from("x")])).is_err());
    }

    #[test]
    fn test_config_builders() {
        let config = HasManyConfig::new("order_id")
            .local_key("number")
            .condition("active", true)
            .limit(10)
            .manage_deletes(false);
        assert_eq!(config.local_key.as_deref(), Some("number"));
        assert_eq!(config.conditions.get("active"), Some(&Value::from(true)));
        assert_eq!(config.limit, Some(10));
        assert!(!config.manage_deletes);
        assert!(config.before_save.is_none());
    }
}
