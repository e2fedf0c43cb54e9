//! PropertySet - The compiled, ordered schema of a model
//!
//! A set is assembled from one or more configuration sources. Names are
//! unique; when two sources declare the same name the first one wins.
//! Registered prefixes route flattened names such as `addr_city` to the
//! nested model held by the delegate property, longest prefix first.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::slot::Property;
use super::flags::{PropertyFlag, PropertyFlags};
use crate::config::compiler::compile_field;
use crate::config::{EntityConfig, ModelHook, ModelValidator};
use crate::context::EntityContext;
use crate::error::{ModelError, ModelResult};

/// Notified with the names added by one `add_property_config` batch
pub type MemberListener = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Ordered, uniquely named collection of properties
#[derive(Clone, Default)]
pub struct PropertySet {
    name: String,
    properties: IndexMap<String, Property>,
    sources: Vec<String>,
    primary_key: Option<String>,
    primary_keys: Vec<String>,
    /// (prefix, delegate property), longest prefix first
    prefixes: Vec<(String, String)>,
    listeners: Vec<MemberListener>,
    validators: Vec<ModelValidator>,
    pre_validate: Vec<ModelHook>,
    before_save: Vec<ModelHook>,
    after_save: Vec<ModelHook>,
}

impl PropertySet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the configuration sources, in the order they were added
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Compile configuration sources and append their properties
    ///
    /// The batch is staged first: a configuration error leaves the set
    /// untouched. Returns the names that were added.
    pub fn add_property_config<I>(
        &mut self,
        context: &EntityContext,
        sources: I,
    ) -> ModelResult<Vec<String>>
    where
        I: IntoIterator<Item = EntityConfig>,
    {
        let mut staged: Vec<Property> = Vec::new();
        let mut staged_sources = Vec::new();

        for source in sources {
            let mut seen = HashSet::new();
            for field in &source.fields {
                if !seen.insert(field.name.clone()) {
                    return Err(ModelError::configuration(format!(
                        "{}: duplicate field '{}'",
                        source.name, field.name
                    )));
                }
                if self.properties.contains_key(&field.name)
                    || staged.iter().any(|p| p.name() == field.name)
                {
                    tracing::warn!(
                        "Field {} from source {} ignored, already declared by an earlier source",
                        field.name,
                        source.name
                    );
                    continue;
                }

                let mut property = compile_field(context, &source.name, field)?;
                property.reset().map_err(|e| {
                    ModelError::configuration(format!(
                        "{}.{}: invalid default: {}",
                        source.name, field.name, e
                    ))
                })?;
                staged.push(property);
            }
            staged_sources.push(source);
        }

        let added: Vec<String> = staged.iter().map(|p| p.name().to_string()).collect();
        for property in staged {
            self.insert_property(property);
        }
        for source in staged_sources {
            self.validators.extend(source.validators);
            self.pre_validate.extend(source.pre_validate);
            self.before_save.extend(source.before_save);
            self.after_save.extend(source.after_save);
            self.sources.push(source.name);
        }

        if !added.is_empty() {
            tracing::debug!("Added {} properties to {}", added.len(), self.name);
            for listener in &self.listeners {
                listener(&added);
            }
        }
        Ok(added)
    }

    /// Append an already built property, first writer wins
    ///
    /// Returns `false` when the name is taken. The property is expected to
    /// have been reset.
    pub fn add_property(&mut self, property: Property) -> bool {
        if self.properties.contains_key(property.name()) {
            return false;
        }
        let name = property.name().to_string();
        self.insert_property(property);
        for listener in &self.listeners {
            listener(std::slice::from_ref(&name));
        }
        true
    }

    fn insert_property(&mut self, property: Property) {
        let name = property.name().to_string();
        if property.is_primary() {
            self.primary_keys.push(name.clone());
            self.primary_key.get_or_insert_with(|| name.clone());
        }
        if let Some(prefix) = property.prefix() {
            self.prefixes.push((prefix.to_string(), name.clone()));
            self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }
        self.properties.insert(name, property);
    }

    /// Register a listener for member additions
    pub fn on_member_added<F>(&mut self, listener: F)
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Live copy for a new model: every property cloned and reset
    pub fn instantiate(&self) -> ModelResult<PropertySet> {
        let mut copy = self.clone();
        for property in copy.properties.values_mut() {
            *property = property.fresh_copy()?;
        }
        Ok(copy)
    }

    /// Direct member lookup, no prefix routing
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Longest registered prefix strictly shorter than `name` that starts it
    ///
    /// Returns `(delegate property, remainder)`.
    pub fn resolve_prefix<'a>(&'a self, name: &'a str) -> Option<(&'a str, &'a str)> {
        self.prefixes
            .iter()
            .find(|(prefix, _)| name.len() > prefix.len() && name.starts_with(prefix.as_str()))
            .map(|(prefix, delegate)| (delegate.as_str(), &name[prefix.len()..]))
    }

    /// Resolve a name, routing through prefixes into nested models
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        if let Some(property) = self.properties.get(name) {
            return Some(property);
        }
        let (delegate, rest) = self.resolve_prefix(name)?;
        self.properties
            .get(delegate)?
            .raw_value()
            .as_model()?
            .properties()
            .get_property(rest)
    }

    pub fn get_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        if self.properties.contains_key(name) {
            return self.properties.get_mut(name);
        }
        let (delegate, rest) = self.resolve_prefix(name)?;
        let (delegate, rest) = (delegate.to_string(), rest.to_string());
        self.properties
            .get_mut(&delegate)?
            .raw_value_mut()
            .as_model_mut()?
            .properties_mut()
            .get_property_mut(&rest)
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.get_property(name).is_some()
    }

    /// First property flagged primary
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Every property flagged primary, in declaration order
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn primary_property(&self) -> Option<&Property> {
        self.primary_key.as_deref().and_then(|name| self.properties.get(name))
    }

    /// Mark every property read-only or writable
    pub fn set_read_only(&mut self, read_only: bool) {
        for property in self.properties.values_mut() {
            property.set_read_only(read_only);
        }
    }

    /// Properties carrying the given tag
    pub fn by_tag(&self, tag: &str) -> Vec<&Property> {
        self.properties
            .values()
            .filter(|property| property.tag() == Some(tag))
            .collect()
    }

    /// Properties carrying the given flag
    pub fn with_flag(&self, flag: PropertyFlag) -> Vec<&Property> {
        self.properties
            .values()
            .filter(|property| property.has_flag(flag))
            .collect()
    }

    pub fn remove_flags(&mut self, name: &str, flags: PropertyFlags) -> bool {
        match self.properties.get_mut(name) {
            Some(property) => {
                property.remove_flags(flags);
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.values_mut()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn validators(&self) -> &[ModelValidator] {
        &self.validators
    }

    pub fn pre_validate_hooks(&self) -> &[ModelHook] {
        &self.pre_validate
    }

    pub fn before_save_hooks(&self) -> &[ModelHook] {
        &self.before_save
    }

    pub fn after_save_hooks(&self) -> &[ModelHook] {
        &self.after_save
    }
}

impl fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySet")
            .field("name", &self.name)
            .field("properties", &self.properties.values().collect::<Vec<_>>())
            .field("primary_keys", &self.primary_keys)
            .field("prefixes", &self.prefixes)
            .field("sources", &self.sources)
            .finish()
    }
}
