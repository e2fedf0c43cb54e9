//! Configuration sources - declarative field tables consumed by the compiler
//!
//! A source is plain data that can come from code or from JSON/YAML. The
//! callbacks it carries (behaviors, relation providers, whole-model hooks)
//! are never serialized and must be attached programmatically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::property::{Behavior, PropertyFlags, PropertyType};
use crate::relationships::RelationshipProvider;
use crate::value::Value;

/// Hook run against a mutable model (pre-validate, before/after save)
pub type ModelHook = Arc<dyn Fn(&mut Model) -> ModelResult<()> + Send + Sync>;

/// Whole-model validation callback
pub type ModelValidator = Arc<dyn Fn(&Model) -> ModelResult<()> + Send + Sync>;

/// Declarative description of one field
#[derive(Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default, skip_serializing_if = "PropertyFlags::is_empty")]
    pub flags: PropertyFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Registered class of a nested model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    /// Flattened-name prefix routed to the nested model held by this field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip)]
    pub behaviors: Vec<Behavior>,
    #[serde(skip)]
    pub relation: Option<Arc<dyn RelationshipProvider>>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, kind: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: PropertyFlags::NONE,
            default: None,
            class: None,
            min: None,
            max: None,
            pattern: None,
            values: Vec::new(),
            prefix: None,
            tag: None,
            behaviors: Vec::new(),
            relation: None,
        }
    }

    pub fn flags(mut self, flags: PropertyFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn primary(self) -> Self {
        self.flags(PropertyFlags::PRIMARY)
    }

    pub fn required(self) -> Self {
        self.flags(PropertyFlags::REQUIRED)
    }

    pub fn nullable(self) -> Self {
        self.flags(PropertyFlags::USE_NULL)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into().to_json());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn relation(mut self, provider: Arc<dyn RelationshipProvider>) -> Self {
        self.relation = Some(provider);
        self
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("default", &self.default)
            .field("class", &self.class)
            .field("prefix", &self.prefix)
            .field("behaviors", &self.behaviors.len())
            .field("relation", &self.relation.as_ref().map(|r| r.kind()))
            .finish()
    }
}

/// One configuration source: an ordered field table plus whole-model hooks
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(skip)]
    pub validators: Vec<ModelValidator>,
    #[serde(skip)]
    pub pre_validate: Vec<ModelHook>,
    #[serde(skip)]
    pub before_save: Vec<ModelHook>,
    #[serde(skip)]
    pub after_save: Vec<ModelHook>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(source: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_yaml_str(source: &str) -> ModelResult<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn to_json_string(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }

    /// Whole-model check, run after every property validated
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
        self
    }

    pub fn pre_validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Model) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.pre_validate.push(Arc::new(f));
        self
    }

    pub fn before_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Model) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.before_save.push(Arc::new(f));
        self
    }

    pub fn after_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Model) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.after_save.push(Arc::new(f));
        self
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldConfig> {
        self.fields.iter_mut().find(|field| field.name == name)
    }

    /// Attach a behavior to a field of a parsed source
    pub fn attach_behavior(&mut self, field: &str, behavior: Behavior) -> ModelResult<()> {
        self.require_field(field)?.behaviors.push(behavior);
        Ok(())
    }

    /// Attach a relationship provider to a field of a parsed source
    pub fn attach_relation(
        &mut self,
        field: &str,
        provider: Arc<dyn RelationshipProvider>,
    ) -> ModelResult<()> {
        self.require_field(field)?.relation = Some(provider);
        Ok(())
    }

    fn require_field(&mut self, field: &str) -> ModelResult<&mut FieldConfig> {
        let source = self.name.clone();
        self.field_mut(field).ok_or_else(|| {
            ModelError::configuration(format!("source '{}' has no field '{}'", source, field))
        })
    }
}

impl fmt::Debug for EntityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfig")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("validators", &self.validators.len())
            .field("pre_validate", &self.pre_validate.len())
            .field("before_save", &self.before_save.len())
            .field("after_save", &self.after_save.len())
            .finish()
    }
}
