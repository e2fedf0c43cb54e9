//! Relationships Module - lazy relation providers and save reconciliation

pub mod has_many;
pub mod has_one;
pub mod identity;
pub mod reconcile;
pub mod traits;

pub use has_many::{HasManyConfig, HasManyProvider};
pub use has_one::{HasOneConfig, HasOneProvider};
pub use identity::{CacheEntry, Claim, IdentityCache, LoadPhase};
pub use reconcile::{combine_hooks, orphan_ids, SaveOrder, SavePhase, SavePlan, SaveStep, StepFn};
pub use traits::{RelationKind, RelationshipProvider};
