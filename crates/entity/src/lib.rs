//! # elif-entity: Entity Graph for elif.rs
//!
//! Schema-driven records built from declarative field configuration.
//! A [`Model`] owns a [`PropertySet`] of typed, validated properties,
//! nests child models under field prefixes and resolves relation fields
//! lazily through [`RelationshipProvider`]s. Saving an aggregate runs a
//! [`SavePlan`]: has-one children first, then the record itself, then
//! has-many children with orphan removal.
//!
//! Storage is out of scope; everything goes through the [`Repository`]
//! trait.

pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod property;
pub mod relationships;
pub mod repository;
pub mod validation;
pub mod value;

pub use config::{EntityConfig, EntitySettings, FieldConfig, ModelHook, ModelValidator};
pub use context::{EntityContext, ModelHandle};
pub use error::{ModelError, ModelResult};
pub use model::{FieldDiff, Model, ToArrayOptions};
pub use property::{
    AccessContext, Behavior, Property, PropertyFlag, PropertyFlags, PropertySet, PropertyType,
    WriteMode,
};
pub use relationships::{
    HasManyConfig, HasManyProvider, HasOneConfig, HasOneProvider, RelationKind,
    RelationshipProvider, SavePhase, SavePlan, SaveStep,
};
pub use repository::Repository;
pub use validation::{Constraints, ValidationError, ValidationErrors};
pub use value::{FieldMap, Value};
