//! Validation primitives shared by properties, models and providers

pub mod constraints;
pub mod error;

pub use constraints::Constraints;
pub use error::{ValidationError, ValidationErrors};
