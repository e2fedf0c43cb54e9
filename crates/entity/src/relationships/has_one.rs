//! HasOne Relationship - parent model points at one child record
//!
//! The parent stores the child's id in a foreign key field. The child is
//! fetched by that id on first read and saved before the parent, whose
//! foreign key is then updated to the child's id. While the foreign key is
//! empty the field holds a blank child ready to be filled in.

use std::fmt;
use std::sync::Arc;

use super::identity::{Claim, IdentityCache, LoadPhase};
use super::reconcile::{SaveOrder, SavePhase, SavePlan};
use super::traits::{RelationKind, RelationshipProvider};
use crate::context::ModelHandle;
use crate::error::{ModelError, ModelResult};
use crate::model::validate::nest;
use crate::model::Model;
use crate::property::{AccessContext, WriteMode};
use crate::repository::Repository;
use crate::value::{FieldMap, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasOneConfig {
    /// Field on the parent holding the child's id
    pub foreign_key: String,
    /// Fetch the child again on every read instead of once per id
    pub fresh_reads: bool,
}

impl HasOneConfig {
    pub fn new(foreign_key: impl Into<String>) -> Self {
        Self {
            foreign_key: foreign_key.into(),
            fresh_reads: false,
        }
    }

    pub fn fresh_reads(mut self, fresh: bool) -> Self {
        self.fresh_reads = fresh;
        self
    }
}

/// Provider for one has-one field
pub struct HasOneProvider {
    repository: Arc<dyn Repository>,
    config: HasOneConfig,
    cache: Arc<IdentityCache>,
}

impl HasOneProvider {
    pub fn new(repository: Arc<dyn Repository>, config: HasOneConfig) -> Self {
        Self {
            repository,
            config,
            cache: Arc::new(IdentityCache::new()),
        }
    }

    pub fn config(&self) -> &HasOneConfig {
        &self.config
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    fn foreign_key(&self, parent: &Model) -> ModelResult<Option<String>> {
        let value = parent.raw_value(&self.config.foreign_key).ok_or_else(|| {
            ModelError::configuration(format!(
                "{} has no foreign key field {}",
                parent.class(),
                self.config.foreign_key
            ))
        })?;
        Ok(if value.is_empty() { None } else { value.to_key_string() })
    }

    fn blank(&self) -> ModelResult<Value> {
        Ok(Value::from(self.repository.create(&FieldMap::new())?))
    }

    fn normalize(&self, supplied: Value) -> ModelResult<Value> {
        match supplied {
            Value::Null => self.blank(),
            Value::Model(child) => Ok(Value::Model(child)),
            Value::Map(data) => Ok(Value::from(self.repository.create(&data)?)),
            other => Err(ModelError::Relationship(format!(
                "has-one value must be a model or a map, got {}",
                other.type_name()
            ))),
        }
    }
}

fn held(parent: &Model, field: &str) -> Value {
    parent.raw_value(field).cloned().unwrap_or_default()
}

/// A blank child nobody touched stands for "no related record"
fn is_placeholder(child: &Model) -> bool {
    child.is_new() && !child.has_edits()
}

impl RelationshipProvider for HasOneProvider {
    fn kind(&self) -> RelationKind {
        RelationKind::HasOne
    }

    fn resolve(
        &self,
        parent: &mut Model,
        field: &str,
        supplied: Option<Value>,
        _context: AccessContext,
    ) -> ModelResult<Value> {
        let key = self.foreign_key(parent)?;
        let handle = parent.handle();

        if let Some(supplied) = supplied {
            let child = self.normalize(supplied)?;
            tracing::debug!("Override of {}.{} on {}", parent.class(), field, handle);
            parent.write_field(field, child, WriteMode::Set)?;
            self.cache.mark_overridden(handle, key);
            return Ok(held(parent, field));
        }

        let Some(key) = key else {
            let keep = self.cache.phase(handle) == LoadPhase::Overridden
                || parent
                    .raw_value(field)
                    .and_then(Value::as_model)
                    .map_or(false, Model::is_new);
            if !keep {
                tracing::trace!("Giving {}.{} on {} a blank record", parent.class(), field, handle);
                let blank = self.blank()?;
                parent.write_field(field, blank, WriteMode::Hydrate)?;
            }
            return Ok(held(parent, field));
        };

        match self.cache.claim(handle, &key, self.config.fresh_reads) {
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
                tracing::debug!(
                    "Loading {}.{} for {} with id {}",
                    parent.class(),
                    field,
                    handle,
                    key
                );
                let loaded = self
                    .repository
                    .get(&key)
                    .and_then(|child| {
                        parent.write_field(field, Value::from(child), WriteMode::Hydrate)
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
        match parent.field_value_mut(field).and_then(Value::as_model_mut) {
            Some(child) if !is_placeholder(child) => {
                child.validate().map_err(|error| nest(error, field))
            }
            _ => Ok(()),
        }
    }

    fn save_plan(&self, _parent: &Model, field: &str) -> ModelResult<SavePlan> {
        let (name, foreign_key) = (field.to_string(), self.config.foreign_key.clone());
        let (repository, cache) = (self.repository.clone(), self.cache.clone());

        let plan = SavePlan::new(SaveOrder::BeforeParent).step(
            SavePhase::Main,
            format!("{}: save child", field),
            move |parent| {
                let child_id = match parent.field_value_mut(&name).and_then(Value::as_model_mut) {
                    Some(child) if !is_placeholder(child) => {
                        SavePlan::for_aggregate(child, repository.as_ref())?.execute(child)?;
                        child.id()
                    }
                    _ => return Ok(()),
                };
                if child_id.is_empty() {
                    return Err(ModelError::Relationship(format!(
                        "{}.{} was saved without an id",
                        parent.class(),
                        name
                    )));
                }
                if parent.raw_value(&foreign_key) != Some(&child_id) {
                    parent.assign(&foreign_key, child_id.clone())?;
                }
                cache.settle(parent.handle(), child_id.to_key_string());
                Ok(())
            },
        );
        Ok(plan)
    }

    fn delete_related(&self, parent: &mut Model, field: &str) -> ModelResult<usize> {
        self.resolve(parent, field, None, AccessContext::Persist)?;
        let id = parent
            .raw_value(field)
            .and_then(Value::as_model)
            .map(Model::id)
            .unwrap_or_default();
        if id.is_empty() {
            return Ok(0);
        }

        let key = id.to_key_string().unwrap_or_default();
        self.repository.remove_by_id(&key)?;

        let cleared = parent
            .properties()
            .get(&self.config.foreign_key)
            .map(|property| property.default_value().clone())
            .unwrap_or_default();
        parent.assign(&self.config.foreign_key, cleared)?;
        let blank = self.blank()?;
        parent.write_field(field, blank, WriteMode::Hydrate)?;
        self.cache.release(parent.handle());
        tracing::debug!("Deleted {} record {} of {}", field, key, parent.handle());
        Ok(1)
    }

    fn release(&self, handle: ModelHandle) {
        self.cache.release(handle);
    }

    fn fork(&self, from: ModelHandle, to: ModelHandle) {
        self.cache.fork(from, to);
    }
}

impl fmt::Debug for HasOneProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasOneProvider")
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_to_sticky_reads() {
        let config = HasOneConfig::new("address_id");
        assert_eq!(config.foreign_key, "address_id");
        assert!(!config.fresh_reads);
        assert!(HasOneConfig::new("address_id").fresh_reads(true).fresh_reads);
    }
}
