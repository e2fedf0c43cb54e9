//! Relationship Traits - The contract between a relation field and its provider

use std::fmt;

use super::reconcile::SavePlan;
use crate::context::ModelHandle;
use crate::error::ModelResult;
use crate::model::Model;
use crate::property::AccessContext;
use crate::value::Value;

/// Cardinality of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    HasOne,
    HasMany,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::HasOne => write!(f, "has_one"),
            RelationKind::HasMany => write!(f, "has_many"),
        }
    }
}

/// Resolves related records for one relation field
///
/// A provider is shared by every model that declares the relation, across
/// threads. Per-model state is keyed by [`ModelHandle`]; one provider
/// instance serves exactly one field.
pub trait RelationshipProvider: Send + Sync + fmt::Debug {
    fn kind(&self) -> RelationKind;

    /// Value of the relation field on `parent`
    ///
    /// With `supplied` set, the value is a manual override: it is stored on
    /// the parent as is (after normalization) and no load happens.
    /// Otherwise related records are loaded at most once per parent key.
    fn resolve(
        &self,
        parent: &mut Model,
        field: &str,
        supplied: Option<Value>,
        context: AccessContext,
    ) -> ModelResult<Value>;

    /// Validate the related records currently held, without loading
    fn validate(&self, parent: &mut Model, field: &str) -> ModelResult<()>;

    /// Steps that persist the related records with the parent
    fn save_plan(&self, parent: &Model, field: &str) -> ModelResult<SavePlan>;

    /// Delete the related records through the repository; returns the count
    fn delete_related(&self, parent: &mut Model, field: &str) -> ModelResult<usize>;

    /// Forget cached state for a model that is going away
    fn release(&self, handle: ModelHandle);

    /// Give a copied model the cache state of its source
    fn fork(&self, from: ModelHandle, to: ModelHandle);
}
