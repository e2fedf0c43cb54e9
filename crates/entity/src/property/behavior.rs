//! Behaviors - Optional callback bundles attached to a property
//!
//! A property holds an ordered list of behaviors. Each pipeline stage walks
//! the list in registration order and uses every behavior that fills the
//! corresponding slot.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;

use crate::error::ModelResult;
use crate::model::Model;
use crate::value::Value;

/// Why a value is being read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessContext {
    /// Plain application read
    #[default]
    Read,
    /// Read on behalf of `to_array` / serialization
    Serialize,
    /// Read on behalf of a save plan
    Persist,
}

pub type ValidateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type SetterFn = Arc<dyn Fn(Value) -> ModelResult<Value> + Send + Sync>;
pub type GetterFn = Arc<dyn Fn(Value, AccessContext) -> Value + Send + Sync>;
pub type ModelSetterFn = Arc<dyn Fn(&Model, Value) -> ModelResult<Value> + Send + Sync>;
pub type ModelGetterFn =
    Arc<dyn Fn(&Model, Value, AccessContext) -> ModelResult<Value> + Send + Sync>;
/// Receives `(old, new)`; an error vetoes the write
pub type ChangeFn = Arc<dyn Fn(&Value, &Value) -> ModelResult<()> + Send + Sync>;
pub type InitFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type EmptyFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type SerializeFn = Arc<dyn Fn(serde_json::Value) -> serde_json::Value + Send + Sync>;

/// Callback bundle; every slot is optional
#[derive(Clone, Default)]
pub struct Behavior {
    pub(crate) name: Option<String>,
    pub(crate) validate: Option<ValidateFn>,
    pub(crate) setter: Option<SetterFn>,
    pub(crate) getter: Option<GetterFn>,
    pub(crate) model_setter: Option<ModelSetterFn>,
    pub(crate) model_getter: Option<ModelGetterFn>,
    pub(crate) on_change: Option<ChangeFn>,
    pub(crate) init: Option<InitFn>,
    pub(crate) is_empty: Option<EmptyFn>,
    pub(crate) serialize: Option<SerializeFn>,
}

impl Behavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Named behavior; the name shows up in validation errors and debug output
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Extra validity check; `false` fails validation of the property
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Filter applied to incoming values before validation
    pub fn setter<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> ModelResult<Value> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(f));
        self
    }

    /// Filter applied to outgoing values
    pub fn getter<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, AccessContext) -> Value + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(f));
        self
    }

    /// Setter filter that can see the owning model
    pub fn model_setter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, Value) -> ModelResult<Value> + Send + Sync + 'static,
    {
        self.model_setter = Some(Arc::new(f));
        self
    }

    /// Getter filter that can see the owning model
    pub fn model_getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Model, Value, AccessContext) -> ModelResult<Value> + Send + Sync + 'static,
    {
        self.model_getter = Some(Arc::new(f));
        self
    }

    /// Change listener, called with `(old, new)` before the value is committed
    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(f));
        self
    }

    /// Transforms the default value on reset
    pub fn init<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(f));
        self
    }

    /// Replaces the built-in emptiness test
    pub fn is_empty<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.is_empty = Some(Arc::new(f));
        self
    }

    /// Last transformation applied to serialized output
    pub fn serialize<F>(mut self, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    /// Trims surrounding whitespace from string input
    pub fn trim() -> Self {
        Behavior::named("trim").setter(|value| {
            Ok(match value {
                Value::Str(s) => Value::Str(s.trim().to_string()),
                other => other,
            })
        })
    }

    /// Lowercases string input
    pub fn lowercase() -> Self {
        Behavior::named("lowercase").setter(|value| {
            Ok(match value {
                Value::Str(s) => Value::Str(s.to_lowercase()),
                other => other,
            })
        })
    }

    /// Initializes an empty default to the current time
    pub fn timestamp() -> Self {
        Behavior::named("timestamp").init(|value| {
            if value.is_empty() {
                Value::Date(Utc::now())
            } else {
                value
            }
        })
    }

    /// Hides the value from serialized output without excluding the field
    pub fn redact(mask: &'static str) -> Self {
        Behavior::named("redact").serialize(move |_| serde_json::Value::String(mask.to_string()))
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<&str> = [
            ("validate", self.validate.is_some()),
            ("setter", self.setter.is_some()),
            ("getter", self.getter.is_some()),
            ("model_setter", self.model_setter.is_some()),
            ("model_getter", self.model_getter.is_some()),
            ("on_change", self.on_change.is_some()),
            ("init", self.init.is_some()),
            ("is_empty", self.is_empty.is_some()),
            ("serialize", self.serialize.is_some()),
        ]
        .into_iter()
        .filter_map(|(slot, present)| present.then_some(slot))
        .collect();

        f.debug_struct("Behavior")
            .field("name", &self.name)
            .field("slots", &slots)
            .finish()
    }
}
