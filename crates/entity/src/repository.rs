//! Repository - The storage collaborator the entity layer talks to
//!
//! The entity layer never touches storage itself. Relationship providers
//! and save plans go through this trait; implementations decide whether a
//! save is an insert or an update.

use crate::config::ModelHook;
use crate::error::ModelResult;
use crate::model::Model;
use crate::property::PropertySet;
use crate::relationships::SaveStep;
use crate::value::FieldMap;

/// Synchronous, object-safe storage interface for one record class
pub trait Repository: Send + Sync {
    /// New, unsaved record populated from `data`
    fn create(&self, data: &FieldMap) -> ModelResult<Model>;

    /// Stored record by id; `ModelError::NotFound` when absent
    fn get(&self, id: &str) -> ModelResult<Model>;

    /// Records whose fields equal every condition
    fn find_by_properties(
        &self,
        conditions: &FieldMap,
        limit: Option<usize>,
    ) -> ModelResult<Vec<Model>>;

    fn remove_by_id(&self, id: &str) -> ModelResult<()>;

    /// Ids of the records whose `property` equals `value`
    fn get_ids_for_property(&self, property: &str, value: &str) -> ModelResult<Vec<String>>;

    /// Steps that persist the record they are run against
    ///
    /// `before` runs ahead of the write and `after` once it succeeded.
    fn get_save_function(
        &self,
        before: Option<ModelHook>,
        after: Option<ModelHook>,
    ) -> ModelResult<Vec<SaveStep>>;

    /// Schema of the records this repository stores
    fn create_property_set(&self) -> ModelResult<PropertySet>;
}
