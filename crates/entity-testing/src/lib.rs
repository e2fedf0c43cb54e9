//! # elif-entity-testing - Test support for elif-entity
//!
//! An in-memory [`Repository`](elif_entity::Repository) with call counters,
//! a small shop schema (customers, orders, line items, addresses) wired
//! with real relationship providers, and assertion helpers.
//!
//! ## Quick Start
//!
//! ```rust
//! use elif_entity_testing::prelude::*;
//!
//! let shop = Shop::new().unwrap();
//! let mut order = shop.orders.create(&fields(json!({"number": "A-1"}))).unwrap();
//! order.save(shop.orders.as_ref()).unwrap();
//! assert_eq!(shop.orders.len(), 1);
//! ```

pub mod assertions;
pub mod fixtures;
pub mod repository;

use std::sync::Once;

use elif_entity::{FieldMap, ModelError, Value};
use tracing_subscriber::EnvFilter;

pub use assertions::EntityAssertions;
pub use fixtures::{Shop, ShopOptions};
pub use repository::InMemoryRepository;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        assertions::EntityAssertions,
        fields, init_test_tracing,
        fixtures::{Shop, ShopOptions},
        repository::InMemoryRepository,
        TestError, TestResult,
    };

    pub use elif_entity::{
        AccessContext, EntityConfig, EntityContext, FieldConfig, FieldMap, HasManyConfig,
        HasOneConfig, Model, ModelError, PropertyType, Repository, ToArrayOptions, Value,
    };
    pub use serde_json::{json, Value as JsonValue};
}

#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Entity error: {0}")]
    Entity(#[from] ModelError),

    #[error("Assertion failed: {message}")]
    Assertion { message: String },

    #[error("Test setup error: {0}")]
    Setup(String),
}

pub type TestResult<T> = Result<T, TestError>;

/// Install a test-friendly subscriber once per process
///
/// Honors `RUST_LOG`; defaults to debug output from the entity crates.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("elif_entity=debug,elif_entity_testing=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Field map from a JSON object; anything else gives an empty map
pub fn fields(json: serde_json::Value) -> FieldMap {
    match Value::from_json(&json) {
        Value::Map(map) => map,
        _ => FieldMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_from_json_object() {
        let map = fields(json!({"id": 3, "sku": "A-1"}));
        assert_eq!(map.get("id"), Some(&Value::Int(3)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["id", "sku"]);
        assert!(fields(json!([1, 2])).is_empty());
    }

    #[test]
    fn test_tracing_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
