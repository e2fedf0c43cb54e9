//! Entity context - explicit registry for handles, settings and compiled classes

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::{EntityConfig, EntitySettings};
use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::property::PropertySet;

/// Handles are unique across contexts; providers may be shared between them
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a live model, never reused within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(u64);

impl ModelHandle {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State every model carries a reference to
#[derive(Debug)]
pub struct ModelRuntime {
    settings: EntitySettings,
}

impl ModelRuntime {
    fn new(settings: EntitySettings) -> Self {
        Self { settings }
    }

    pub(crate) fn allocate(&self) -> ModelHandle {
        ModelHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn settings(&self) -> &EntitySettings {
        &self.settings
    }
}

/// Owns the handle allocator, the settings and the class registry
///
/// Classes are compiled blueprints; models are always created from a copy.
pub struct EntityContext {
    runtime: Arc<ModelRuntime>,
    classes: DashMap<String, Arc<PropertySet>>,
}

impl EntityContext {
    pub fn new() -> Self {
        Self::with_settings(EntitySettings::default())
    }

    pub fn with_settings(settings: EntitySettings) -> Self {
        Self {
            runtime: Arc::new(ModelRuntime::new(settings)),
            classes: DashMap::new(),
        }
    }

    /// Context with settings loaded from the environment
    pub fn from_env() -> ModelResult<Self> {
        Ok(Self::with_settings(EntitySettings::from_env()?))
    }

    pub fn settings(&self) -> &EntitySettings {
        self.runtime.settings()
    }

    pub(crate) fn runtime(&self) -> &Arc<ModelRuntime> {
        &self.runtime
    }

    /// Compile sources into a property set without registering it
    pub fn compile<I>(&self, name: &str, sources: I) -> ModelResult<PropertySet>
    where
        I: IntoIterator<Item = EntityConfig>,
    {
        let mut set = PropertySet::new(name);
        set.add_property_config(self, sources)?;
        Ok(set)
    }

    /// Compile and register a single-source class under the source's name
    pub fn register_class(&self, config: EntityConfig) -> ModelResult<Arc<PropertySet>> {
        let name = config.name.clone();
        self.register_class_from(&name, [config])
    }

    /// Compile and register a class assembled from several sources
    pub fn register_class_from<I>(&self, name: &str, sources: I) -> ModelResult<Arc<PropertySet>>
    where
        I: IntoIterator<Item = EntityConfig>,
    {
        if self.classes.contains_key(name) {
            return Err(ModelError::configuration(format!(
                "class '{}' is already registered",
                name
            )));
        }
        let set = Arc::new(self.compile(name, sources)?);
        self.classes.insert(name.to_string(), set.clone());
        tracing::debug!("Registered entity class {} with {} properties", name, set.len());
        Ok(set)
    }

    pub fn class(&self, name: &str) -> Option<Arc<PropertySet>> {
        self.classes.get(name).map(|entry| entry.value().clone())
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// New model of a registered class
    pub fn create_model(&self, class: &str) -> ModelResult<Model> {
        let blueprint = self
            .class(class)
            .ok_or_else(|| ModelError::configuration(format!("unknown class '{}'", class)))?;
        self.instantiate(&blueprint)
    }

    /// New model from an arbitrary blueprint
    pub fn instantiate(&self, blueprint: &PropertySet) -> ModelResult<Model> {
        Ok(Model::new(self.runtime.clone(), blueprint.instantiate()?))
    }

    /// Drop every registered class
    pub fn clear(&self) {
        self.classes.clear();
    }
}

impl Default for EntityContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityContext")
            .field("settings", self.settings())
            .field("classes", &self.class_names())
            .finish()
    }
}
