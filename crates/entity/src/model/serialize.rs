//! Serialization of models into flat JSON maps

use serde_json::{Map, Value as Json};

use super::Model;
use crate::config::MAX_SERIALIZE_DEPTH;
use crate::error::ModelResult;
use crate::property::{AccessContext, Property, PropertyFlag, PropertyType};
use crate::value::Value;

/// Field selection and recursion options for [`Model::to_array`]
#[derive(Debug, Clone, Default)]
pub struct ToArrayOptions {
    /// Only these fields, in this order; all fields when `None`
    pub fields: Option<Vec<String>>,
    /// Include plain array fields
    pub include_arrays: bool,
    /// Include nested-model and relation fields (may load relations)
    pub include_models: bool,
    /// Include overflow values
    pub include_extra: bool,
    /// Recursion bound; the settings value when `None`
    pub depth: Option<usize>,
}

impl ToArrayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn include_arrays(mut self, include: bool) -> Self {
        self.include_arrays = include;
        self
    }

    pub fn include_models(mut self, include: bool) -> Self {
        self.include_models = include;
        self
    }

    pub fn include_extra(mut self, include: bool) -> Self {
        self.include_extra = include;
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Options for a nested level: same switches, all fields
    fn nested(&self) -> Self {
        Self {
            fields: None,
            ..self.clone()
        }
    }
}

impl Model {
    /// Serialize to a flat JSON map
    ///
    /// Booleans become `0`/`1`, dates RFC 3339 UTC, and a null in a field
    /// that does not allow null is replaced by the field's default.
    /// Prefixed children are flattened under their prefix. Nested models
    /// and relation fields are skipped unless `include_models` is set, so a
    /// plain call never loads a relation.
    pub fn to_array(&mut self, options: &ToArrayOptions) -> ModelResult<Map<String, Json>> {
        let limit = self.settings().max_serialize_depth.min(MAX_SERIALIZE_DEPTH);
        let depth = options.depth.unwrap_or(limit).clamp(1, limit);
        self.to_array_at(options, depth)
    }

    /// [`Model::to_array`] wrapped into a JSON object
    pub fn to_json(&mut self, options: &ToArrayOptions) -> ModelResult<Json> {
        Ok(Json::Object(self.to_array(options)?))
    }

    fn to_array_at(
        &mut self,
        options: &ToArrayOptions,
        depth: usize,
    ) -> ModelResult<Map<String, Json>> {
        if depth == 0 {
            return Ok(Map::new());
        }
        let names: Vec<String> = match &options.fields {
            Some(fields) => fields.clone(),
            None => self.properties.names().map(str::to_string).collect(),
        };

        let mut out = Map::new();
        for name in names {
            let Some(property) = self.properties.get(&name) else {
                // explicitly requested name outside the schema: routed or overflow
                if options.fields.is_some() {
                    let value = self.get_value(&name, AccessContext::Serialize)?;
                    if !value.is_null() || self.overflow.contains_key(&name) {
                        out.insert(name, normalize_plain(&value));
                    }
                }
                continue;
            };

            if property.has_flag(PropertyFlag::NoArrayOutput) {
                continue;
            }

            if let Some(prefix) = property.prefix().map(str::to_string) {
                if depth <= 1 {
                    continue;
                }
                let nested = options.nested();
                if let Some(child) = self.child_mut(&name) {
                    for (key, value) in child.to_array_at(&nested, depth - 1)? {
                        out.insert(format!("{}{}", prefix, key), value);
                    }
                }
                continue;
            }

            let relation = property.provider().is_some();
            let kind = property.kind();
            if (relation || kind == PropertyType::Model) && !options.include_models {
                continue;
            }
            if !relation && kind == PropertyType::Array && !options.include_arrays {
                continue;
            }
            if (relation || kind.holds_models()) && depth <= 1 {
                continue;
            }

            let value = self.get_value(&name, AccessContext::Serialize)?;
            let Some(property) = self.properties.get(&name) else {
                continue;
            };
            let json = normalize(property, value, options, depth)?;
            out.insert(name, property.apply_serialize_filters(json));
        }

        if options.include_extra {
            for (name, value) in &self.overflow {
                if !out.contains_key(name) {
                    out.insert(name.clone(), normalize_plain(value));
                }
            }
        }
        Ok(out)
    }
}

fn normalize(
    property: &Property,
    value: Value,
    options: &ToArrayOptions,
    depth: usize,
) -> ModelResult<Json> {
    match value {
        Value::Null if !property.has_flag(PropertyFlag::UseNull) => {
            Ok(normalize_plain(property.default_value()))
        }
        Value::Model(mut child) => Ok(Json::Object(
            child.to_array_at(&options.nested(), depth.saturating_sub(1))?,
        )),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(match item {
                    Value::Model(mut child) => {
                        Json::Object(child.to_array_at(&options.nested(), depth.saturating_sub(1))?)
                    }
                    other => normalize_plain(&other),
                });
            }
            Ok(Json::Array(out))
        }
        other => Ok(normalize_plain(&other)),
    }
}

/// Output form of a value outside any model recursion
fn normalize_plain(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::from(u8::from(*b)),
        Value::Array(items) => Json::Array(items.iter().map(normalize_plain).collect()),
        Value::Map(map) => Json::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), normalize_plain(value)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityConfig, EntitySettings, FieldConfig};
    use crate::context::EntityContext;
    use crate::property::{Behavior, PropertyFlags};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn context(settings: EntitySettings) -> EntityContext {
        let context = EntityContext::with_settings(settings);
        context
            .register_class(
                EntityConfig::new("address")
                    .field(FieldConfig::new("city", PropertyType::String))
                    .field(FieldConfig::new("verified", PropertyType::Boolean)),
            )
            .unwrap();
        context
            .register_class(
                EntityConfig::new("customer")
                    .field(FieldConfig::new("id", PropertyType::Integer).primary())
                    .field(FieldConfig::new("active", PropertyType::Boolean).with_default(true))
                    .field(FieldConfig::new("joined", PropertyType::Date))
                    .field(FieldConfig::new("tags", PropertyType::Array))
                    .field(
                        FieldConfig::new("password", PropertyType::String)
                            .flags(PropertyFlags::NO_ARRAY_OUTPUT),
                    )
                    .field(
                        FieldConfig::new("email", PropertyType::String)
                            .behavior(Behavior::redact("***")),
                    )
                    .field(FieldConfig::new("home", PropertyType::Model).class("address"))
                    .field(
                        FieldConfig::new("address", PropertyType::Model)
                            .class("address")
                            .prefix("addr_"),
                    ),
            )
            .unwrap();
        context
    }

    #[test]
    fn test_default_output_normalizes_and_skips() {
        let context = context(EntitySettings::default());
        let mut customer = context.create_model("customer").unwrap();
        customer
            .set_value("joined", Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
            .unwrap();
        customer.set_value("addr_city", "Oslo").unwrap();
        customer.set_value("email", "ada@example.com").unwrap();

        let out = customer.to_array(&ToArrayOptions::new()).unwrap();
        assert_eq!(out["active"], json!(1));
        assert_eq!(out["joined"], json!("2024-03-01T08:00:00Z"));
        assert_eq!(out["addr_city"], json!("Oslo"));
        assert_eq!(out["addr_verified"], json!(0));
        assert_eq!(out["email"], json!("***"));
        assert!(!out.contains_key("password"));
        assert!(!out.contains_key("home"));
        assert!(!out.contains_key("tags"));
        assert!(!out.contains_key("address"));
    }

    #[test]
    fn test_included_models_and_arrays() {
        let context = context(EntitySettings::default());
        let mut customer = context.create_model("customer").unwrap();
        customer.set_value("tags", vec![Value::from("vip")]).unwrap();
        customer.set_value("overflowing", true).unwrap();

        let out = customer
            .to_array(
                &ToArrayOptions::new()
                    .include_models(true)
                    .include_arrays(true)
                    .include_extra(true),
            )
            .unwrap();
        assert_eq!(out["tags"], json!(["vip"]));
        assert_eq!(out["home"], json!({"city": "", "verified": 0}));
        assert_eq!(out["overflowing"], json!(1));
    }

    #[test]
    fn test_depth_bounds_nested_output() {
        let context = context(EntitySettings::default());
        let mut customer = context.create_model("customer").unwrap();
        let out = customer
            .to_array(&ToArrayOptions::new().include_models(true).depth(1))
            .unwrap();
        assert!(!out.contains_key("home"));
        assert!(!out.contains_key("addr_city"));
        assert!(out.contains_key("id"));
    }

    #[test]
    fn test_field_selection_reaches_routed_names() {
        let context = context(EntitySettings::default());
        let mut customer = context.create_model("customer").unwrap();
        customer.set_value("addr_city", "Oslo").unwrap();
        let out = customer
            .to_array(&ToArrayOptions::new().fields(["active", "id", "addr_city"]))
            .unwrap();
        let keys: Vec<&String> = out.keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(out["addr_city"], json!("Oslo"));
    }
}
