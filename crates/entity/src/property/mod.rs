//! Properties - typed value slots, their behaviors and the compiled schema

pub mod behavior;
pub mod flags;
pub mod set;
pub mod slot;
pub mod types;

pub use behavior::{AccessContext, Behavior};
pub use flags::{PropertyFlag, PropertyFlags};
pub use set::{MemberListener, PropertySet};
pub use slot::{Property, WriteMode};
pub use types::PropertyType;
