//! Configuration - declarative schema sources, their compiler and runtime settings

pub mod compiler;
pub mod settings;
pub mod source;

pub use compiler::is_valid_name;
pub use settings::{EntitySettings, MAX_SERIALIZE_DEPTH};
pub use source::{EntityConfig, FieldConfig, ModelHook, ModelValidator};
