//! Entity settings - runtime knobs loaded from defaults or the environment

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{ModelError, ModelResult};

/// Hard ceiling on serialization depth
pub const MAX_SERIALIZE_DEPTH: usize = 5;

pub const ENV_MAX_DEPTH: &str = "ELIF_ENTITY_MAX_DEPTH";
pub const ENV_WARN_ON_OVERFLOW: &str = "ELIF_ENTITY_WARN_ON_OVERFLOW";

/// Runtime settings shared by every model created from one context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySettings {
    /// Default and upper bound for `to_array` recursion
    pub max_serialize_depth: usize,
    /// Log writes to unknown fields at `warn` instead of `trace`
    pub warn_on_overflow: bool,
}

impl EntitySettings {
    pub fn new() -> Self {
        Self {
            max_serialize_depth: MAX_SERIALIZE_DEPTH,
            warn_on_overflow: false,
        }
    }

    /// Settings for tests: unknown-field writes are loud
    pub fn testing() -> Self {
        Self {
            max_serialize_depth: MAX_SERIALIZE_DEPTH,
            warn_on_overflow: true,
        }
    }

    pub fn with_max_serialize_depth(mut self, depth: usize) -> Self {
        self.max_serialize_depth = depth;
        self
    }

    pub fn with_warn_on_overflow(mut self, warn: bool) -> Self {
        self.warn_on_overflow = warn;
        self
    }

    /// Load settings from environment variables
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::new();

        if let Some(depth) = lookup(ENV_MAX_DEPTH) {
            settings.max_serialize_depth = depth.trim().parse().map_err(|_| {
                ModelError::configuration(format!(
                    "{} must be an integer between 1 and {}, got '{}'",
                    ENV_MAX_DEPTH, MAX_SERIALIZE_DEPTH, depth
                ))
            })?;
        }

        if let Some(flag) = lookup(ENV_WARN_ON_OVERFLOW) {
            settings.warn_on_overflow = match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ModelError::configuration(format!(
                        "{} must be a boolean, got '{}'",
                        ENV_WARN_ON_OVERFLOW, flag
                    )))
                }
            };
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if !(1..=MAX_SERIALIZE_DEPTH).contains(&self.max_serialize_depth) {
            return Err(ModelError::configuration(format!(
                "max_serialize_depth must be between 1 and {}, got {}",
                MAX_SERIALIZE_DEPTH, self.max_serialize_depth
            )));
        }
        Ok(())
    }
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = EntitySettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, EntitySettings::default());
        assert_eq!(settings.max_serialize_depth, 5);
        assert!(!settings.warn_on_overflow);
    }

    #[test]
    fn test_env_overrides() {
        let settings = EntitySettings::from_lookup(lookup_from(&[
            (ENV_MAX_DEPTH, "3"),
            (ENV_WARN_ON_OVERFLOW, "yes"),
        ]))
        .unwrap();
        assert_eq!(settings.max_serialize_depth, 3);
        assert!(settings.warn_on_overflow);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        for vars in [
            [(ENV_MAX_DEPTH, "9")],
            [(ENV_MAX_DEPTH, "0")],
            [(ENV_MAX_DEPTH, "deep")],
            [(ENV_WARN_ON_OVERFLOW, "sometimes")],
        ] {
            let err = EntitySettings::from_lookup(lookup_from(&vars)).unwrap_err();
            assert!(matches!(err, ModelError::Configuration(_)), "{:?}", vars);
        }
    }
}
