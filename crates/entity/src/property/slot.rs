//! Property - A single named, typed, validated value slot

use serde_json::json;
use std::fmt;
use std::sync::Arc;

use super::behavior::{AccessContext, Behavior, ModelGetterFn, ModelSetterFn};
use super::flags::{PropertyFlag, PropertyFlags};
use super::types::PropertyType;
use crate::error::ModelResult;
use crate::relationships::RelationshipProvider;
use crate::validation::{Constraints, ValidationError};
use crate::value::Value;

/// How a write enters the property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Application write: read-only and write-once rules apply, marks edited
    Set,
    /// Trusted population: skips write rules, never marks edited
    Hydrate,
}

/// Named value holder with default, flags and behaviors
///
/// A freshly constructed property holds `Null`; call [`Property::reset`]
/// before first use so the default goes through the set pipeline.
#[derive(Clone)]
pub struct Property {
    name: String,
    kind: PropertyType,
    flags: PropertyFlags,
    default: Value,
    value: Value,
    behaviors: Vec<Behavior>,
    constraints: Constraints,
    class: Option<String>,
    prefix: Option<String>,
    tag: Option<String>,
    read_only: bool,
    edited: bool,
    provider: Option<Arc<dyn RelationshipProvider>>,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: PropertyFlags::NONE,
            default: Value::Null,
            value: Value::Null,
            behaviors: Vec::new(),
            constraints: Constraints::default(),
            class: None,
            prefix: None,
            tag: None,
            read_only: false,
            edited: false,
            provider: None,
        }
    }

    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn RelationshipProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyType {
        self.kind
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: PropertyFlag) -> bool {
        self.flags.has(flag)
    }

    pub fn add_flags(&mut self, flags: PropertyFlags) {
        self.flags.insert(flags);
    }

    pub fn remove_flags(&mut self, flags: PropertyFlags) {
        self.flags.remove(flags);
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn provider(&self) -> Option<&Arc<dyn RelationshipProvider>> {
        self.provider.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_edited(&self) -> bool {
        self.edited
    }

    pub fn clear_edit_flag(&mut self) {
        self.edited = false;
    }

    pub(crate) fn mark_edited(&mut self) {
        self.edited = true;
    }

    pub fn is_primary(&self) -> bool {
        self.flags.has(PropertyFlag::Primary)
    }

    /// Whether writes are refused once a non-empty value is held
    pub fn is_write_once(&self) -> bool {
        self.flags.has(PropertyFlag::WriteEmpty) || self.flags.has(PropertyFlag::Primary)
    }

    /// Current value without getter filters
    pub fn raw_value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn raw_value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Re-initialize from the default: init behaviors, then the full set pipeline
    pub fn reset(&mut self) -> ModelResult<&mut Self> {
        let mut value = self.default.clone();
        for init in self.behaviors.iter().filter_map(|b| b.init.as_ref()) {
            value = init(value);
        }
        self.write(value, WriteMode::Hydrate)?;
        self.edited = false;
        Ok(self)
    }

    /// A reset copy of this property, as attached to a new model
    pub fn fresh_copy(&self) -> ModelResult<Property> {
        let mut copy = self.clone();
        copy.read_only = false;
        copy.reset()?;
        Ok(copy)
    }

    /// Application write, subject to read-only and write-once rules
    pub fn set_value(&mut self, value: impl Into<Value>) -> ModelResult<()> {
        self.write(value.into(), WriteMode::Set)
    }

    /// Trusted write: validated, but bypasses write rules and edit tracking
    pub fn hydrate(&mut self, value: impl Into<Value>) -> ModelResult<()> {
        self.write(value.into(), WriteMode::Hydrate)
    }

    pub fn write(&mut self, value: Value, mode: WriteMode) -> ModelResult<()> {
        if mode == WriteMode::Set {
            self.check_writable()?;
        }

        let mut value = value;
        for setter in self.behaviors.iter().filter_map(|b| b.setter.as_ref()) {
            value = setter(value)?;
        }
        let value = self.kind.coerce(value);
        self.validate(&value)?;

        for listener in self.behaviors.iter().filter_map(|b| b.on_change.as_ref()) {
            listener(&self.value, &value)?;
        }

        self.value = value;
        if mode == WriteMode::Set {
            self.edited = true;
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), ValidationError> {
        if self.read_only {
            return Err(ValidationError::with_code(
                &self.name,
                format!("{} is read-only", self.name),
                "read_only",
            ));
        }
        if self.is_write_once() && !self.is_empty() {
            return Err(ValidationError::with_code(
                &self.name,
                format!("{} can only be written while empty", self.name),
                "write_once",
            )
            .offending(self.value.to_json(), "empty current value"));
        }
        Ok(())
    }

    /// Read through the getter filters
    pub fn get_value(&self, context: AccessContext) -> Value {
        self.apply_getters(self.value.clone(), context)
    }

    pub(crate) fn apply_getters(&self, value: Value, context: AccessContext) -> Value {
        let mut value = value;
        for getter in self.behaviors.iter().filter_map(|b| b.getter.as_ref()) {
            value = getter(value, context);
        }
        if self.flags.has(PropertyFlag::UseNull) && self.is_empty_value(&value) {
            return Value::Null;
        }
        value
    }

    /// Behavior checks, then the null check, then type-specific validation
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        for behavior in &self.behaviors {
            if let Some(check) = &behavior.validate {
                if !check(value) {
                    let rule = behavior.name().unwrap_or("custom rule");
                    return Err(ValidationError::with_code(
                        &self.name,
                        format!("{} failed {} validation", self.name, rule),
                        "behavior",
                    )
                    .offending(value.to_json(), rule));
                }
            }
        }

        if value.is_null() {
            if self.flags.has(PropertyFlag::UseNull) {
                return Ok(());
            }
            return Err(ValidationError::with_code(
                &self.name,
                format!("{} cannot be null", self.name),
                "null",
            )
            .offending(json!(null), format!("non-null {}", self.kind)));
        }

        self.kind.validate_value(&self.name, value, &self.constraints)
    }

    /// Validate the currently held value
    pub fn validate_current(&self) -> Result<(), ValidationError> {
        self.validate(&self.value)
    }

    /// Emptiness of the held value, honoring an is-empty behavior
    pub fn is_empty(&self) -> bool {
        self.is_empty_value(&self.value)
    }

    pub fn is_empty_value(&self, value: &Value) -> bool {
        match self.behaviors.iter().find_map(|b| b.is_empty.as_ref()) {
            Some(predicate) => predicate(value),
            None => value.is_empty(),
        }
    }

    pub(crate) fn apply_serialize_filters(&self, json: serde_json::Value) -> serde_json::Value {
        self.behaviors
            .iter()
            .filter_map(|b| b.serialize.as_ref())
            .fold(json, |acc, filter| filter(acc))
    }

    pub(crate) fn model_setters(&self) -> Vec<ModelSetterFn> {
        self.behaviors
            .iter()
            .filter_map(|b| b.model_setter.clone())
            .collect()
    }

    pub(crate) fn model_getters(&self) -> Vec<ModelGetterFn> {
        self.behaviors
            .iter()
            .filter_map(|b| b.model_getter.clone())
            .collect()
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("value", &self.value)
            .field("edited", &self.edited)
            .field("read_only", &self.read_only)
            .field("prefix", &self.prefix)
            .field("behaviors", &self.behaviors)
            .field("has_provider", &self.provider.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn primary_id() -> Property {
        let mut id = Property::new("id", PropertyType::Integer)
            .with_flags(PropertyFlags::PRIMARY | PropertyFlags::WRITE_EMPTY)
            .with_default(0);
        id.reset().unwrap();
        id
    }

    #[test]
    fn test_reset_runs_default_through_pipeline() {
        let mut name = Property::new("name", PropertyType::String)
            .with_default("  Ada ")
            .with_behavior(Behavior::trim());
        name.reset().unwrap();

        assert_eq!(name.raw_value(), &Value::from("Ada"));
        assert!(!name.is_edited());
        assert!(name.validate_current().is_ok());
    }

    #[test]
    fn test_invalid_default_fails_reset() {
        let mut qty = Property::new("qty", PropertyType::Integer)
            .with_default(0)
            .with_constraints(Constraints::new().min(1.0));
        let err = qty.reset().unwrap_err();
        assert_eq!(err.as_validation().map(|e| e.code.as_str()), Some("min"));
    }

    #[test]
    fn test_primary_key_is_write_once() {
        let mut id = primary_id();
        id.set_value(5).unwrap();
        assert!(id.is_edited());

        let err = id.set_value(6).unwrap_err();
        assert_eq!(err.as_validation().map(|e| e.code.as_str()), Some("write_once"));
        assert_eq!(id.raw_value(), &Value::Int(5));
    }

    #[test]
    fn test_hydrate_bypasses_write_rules_and_edit_tracking() {
        let mut id = primary_id();
        id.hydrate(5).unwrap();
        id.hydrate(6).unwrap();
        assert_eq!(id.raw_value(), &Value::Int(6));
        assert!(!id.is_edited());

        id.set_read_only(true);
        id.hydrate(7).unwrap();
        assert!(id.set_value(8).is_err());
    }

    #[test]
    fn test_hydrate_still_validates() {
        let mut id = primary_id();
        assert!(matches!(id.hydrate("abc"), Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_read_only_always_fails() {
        let mut name = Property::new("name", PropertyType::String);
        name.reset().unwrap();
        name.set_read_only(true);
        let err = name.set_value("x").unwrap_err();
        assert_eq!(err.as_validation().map(|e| e.code.as_str()), Some("read_only"));
    }

    #[test]
    fn test_validate_behaviors_short_circuit() {
        let second_calls = Arc::new(AtomicUsize::new(0));
        let counter = second_calls.clone();
        let mut code = Property::new("code", PropertyType::String)
            .with_default("ok")
            .with_behavior(Behavior::named("not_banned").validate(|v| v.as_str() != Some("banned")))
            .with_behavior(Behavior::named("counted").validate(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }));
        code.reset().unwrap();
        let after_reset = second_calls.load(Ordering::SeqCst);

        let err = code.set_value("banned").unwrap_err();
        let validation = err.as_validation().unwrap();
        assert_eq!(validation.code, "behavior");
        assert_eq!(validation.expected(), Some("not_banned"));
        assert_eq!(second_calls.load(Ordering::SeqCst), after_reset);
    }

    #[test]
    fn test_null_requires_use_null() {
        let strict = Property::new("note", PropertyType::String);
        assert_eq!(strict.validate(&Value::Null).unwrap_err().code, "null");

        let nullable =
            Property::new("note", PropertyType::String).with_flags(PropertyFlags::USE_NULL);
        assert!(nullable.validate(&Value::Null).is_ok());
    }

    #[test]
    fn test_on_change_sees_old_and_new_and_can_veto() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        let mut status = Property::new("status", PropertyType::String)
            .with_default("draft")
            .with_behavior(Behavior::new().on_change(move |old, new| {
                log.lock().unwrap().push((old.clone(), new.clone()));
                if new.as_str() == Some("locked") {
                    return Err(ValidationError::new("status", "cannot lock").into());
                }
                Ok(())
            }));
        status.reset().unwrap();
        status.set_value("live").unwrap();
        assert!(status.set_value("locked").is_err());
        assert_eq!(status.raw_value(), &Value::from("live"));

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&(Value::from("draft"), Value::from("live"))));
    }

    #[test]
    fn test_getters_and_use_null_on_read() {
        let mut score = Property::new("score", PropertyType::Integer)
            .with_flags(PropertyFlags::USE_NULL)
            .with_default(0)
            .with_behavior(Behavior::new().getter(|v, _| match v {
                Value::Int(i) => Value::Int(i * 10),
                other => other,
            }));
        score.reset().unwrap();
        assert_eq!(score.get_value(AccessContext::Read), Value::Null);

        score.set_value(2).unwrap();
        assert_eq!(score.get_value(AccessContext::Read), Value::Int(20));
    }

    #[test]
    fn test_is_empty_override_drives_write_once() {
        let mut code = Property::new("code", PropertyType::String)
            .with_flags(PropertyFlags::WRITE_EMPTY)
            .with_default("PENDING")
            .with_behavior(Behavior::new().is_empty(|v| v.as_str() == Some("PENDING")));
        code.reset().unwrap();

        code.set_value("A-1").unwrap();
        assert!(code.set_value("A-2").is_err());
    }
}

#[cfg(test)]
mod property_laws {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn defaults_always_validate_after_reset(
            min in -1000i64..1000,
            span in 0i64..1000,
            pick in 0i64..1000,
        ) {
            let max = min + span;
            let default = min + (pick % (span + 1));
            let mut prop = Property::new("n", PropertyType::Integer)
                .with_default(default)
                .with_constraints(Constraints::new().min(min as f64).max(max as f64));
            prop.reset().unwrap();
            prop_assert!(prop.validate(prop.raw_value()).is_ok());
        }

        #[test]
        fn primary_rejects_second_distinct_value(
            first in 1i64..i64::MAX,
            second in 1i64..i64::MAX,
        ) {
            let mut id = Property::new("id", PropertyType::Integer)
                .with_flags(PropertyFlags::PRIMARY)
                .with_default(0);
            id.reset().unwrap();
            id.set_value(first).unwrap();
            prop_assert!(id.set_value(second).is_err());
            prop_assert_eq!(id.raw_value(), &Value::Int(first));
        }
    }
}
