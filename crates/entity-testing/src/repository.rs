//! In-memory repository for entity tests
//!
//! Stores one class of records as raw field maps keyed by id. Every call is
//! counted so tests can assert how often relationship providers reached
//! for storage.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use elif_entity::{
    EntityContext, FieldMap, Model, ModelError, ModelHook, ModelResult, PropertySet, Repository,
    SaveStep, Value,
};
use indexmap::IndexMap;

use crate::{TestError, TestResult};

type Store = IndexMap<String, FieldMap>;

/// Call counters, one per repository operation
#[derive(Debug, Default)]
pub struct CallCounts {
    pub creates: AtomicUsize,
    pub gets: AtomicUsize,
    pub finds: AtomicUsize,
    pub removes: AtomicUsize,
    pub id_lookups: AtomicUsize,
    pub saves: AtomicUsize,
}

impl CallCounts {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        for counter in [
            &self.creates,
            &self.gets,
            &self.finds,
            &self.removes,
            &self.id_lookups,
            &self.saves,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

/// Repository for one registered class, backed by a map
#[derive(Debug)]
pub struct InMemoryRepository {
    context: Arc<EntityContext>,
    class: String,
    store: Arc<Mutex<Store>>,
    next_id: Arc<AtomicI64>,
    counts: Arc<CallCounts>,
    failing: Arc<AtomicBool>,
}

impl InMemoryRepository {
    /// Repository for `class`
    ///
    /// The class may be registered after the repository exists, so a schema
    /// can hold providers that point back at its own repository.
    pub fn new(context: Arc<EntityContext>, class: impl Into<String>) -> Self {
        Self {
            context,
            class: class.into(),
            store: Arc::new(Mutex::new(Store::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            counts: Arc::new(CallCounts::default()),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn counts(&self) -> &CallCounts {
        &self.counts
    }

    pub fn finds(&self) -> usize {
        self.counts.finds.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.counts.gets.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.counts.removes.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.counts.saves.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.counts.reset();
    }

    /// Make every read fail with a repository error until switched off
    pub fn fail_reads(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store a record directly, allocating an id when the data has none
    pub fn seed(&self, data: FieldMap) -> TestResult<String> {
        let key = self.primary_key()?;
        let mut data = data;
        let id = match data.get(&key).and_then(Value::to_key_string) {
            Some(id) => {
                bump_past(&self.next_id, &id);
                id
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                data.insert(key, Value::Int(id));
                id.to_string()
            }
        };
        lock(&self.store)?.insert(id.clone(), data);
        Ok(id)
    }

    /// Stored field map for `id`
    pub fn stored(&self, id: &str) -> Option<FieldMap> {
        lock(&self.store).ok().and_then(|store| store.get(id).cloned())
    }

    /// Stored ids in insertion order
    pub fn ids(&self) -> Vec<String> {
        lock(&self.store)
            .map(|store| store.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        lock(&self.store).map(|store| store.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn primary_key(&self) -> TestResult<String> {
        let blueprint = self
            .context
            .class(&self.class)
            .ok_or_else(|| TestError::Setup(format!("class {} is not registered", self.class)))?;
        blueprint
            .primary_key()
            .map(str::to_string)
            .ok_or_else(|| TestError::Setup(format!("class {} has no primary key", self.class)))
    }

    fn check_failing(&self) -> ModelResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ModelError::Repository(format!("{} storage is unavailable", self.class)));
        }
        Ok(())
    }

    fn materialize(&self, data: &FieldMap) -> ModelResult<Model> {
        let mut model = self.context.create_model(&self.class)?;
        model.hydrate(data.clone())?;
        Ok(model)
    }
}

fn lock(store: &Mutex<Store>) -> ModelResult<MutexGuard<'_, Store>> {
    store
        .lock()
        .map_err(|_| ModelError::Repository("in-memory store lock poisoned".to_string()))
}

fn bump_past(next_id: &AtomicI64, id: &str) {
    if let Ok(numeric) = id.parse::<i64>() {
        next_id.fetch_max(numeric + 1, Ordering::SeqCst);
    }
}

fn satisfies(stored: &FieldMap, conditions: &FieldMap) -> bool {
    conditions.iter().all(|(name, expected)| {
        let actual = stored.get(name).cloned().unwrap_or_default();
        actual == *expected
            || (actual.to_key_string().is_some()
                && actual.to_key_string() == expected.to_key_string())
    })
}

impl Repository for InMemoryRepository {
    fn create(&self, data: &FieldMap) -> ModelResult<Model> {
        CallCounts::bump(&self.counts.creates);
        let mut model = self.context.create_model(&self.class)?;
        model.set_values(data.clone())?;
        Ok(model)
    }

    fn get(&self, id: &str) -> ModelResult<Model> {
        CallCounts::bump(&self.counts.gets);
        self.check_failing()?;
        let data = lock(&self.store)?
            .get(id)
            .cloned()
            .ok_or_else(|| ModelError::NotFound(format!("{}/{}", self.class, id)))?;
        self.materialize(&data)
    }

    fn find_by_properties(
        &self,
        conditions: &FieldMap,
        limit: Option<usize>,
    ) -> ModelResult<Vec<Model>> {
        CallCounts::bump(&self.counts.finds);
        self.check_failing()?;
        let found: Vec<FieldMap> = lock(&self.store)?
            .values()
            .filter(|stored| satisfies(stored, conditions))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        tracing::debug!("Found {} {} records", found.len(), self.class);
        found.iter().map(|data| self.materialize(data)).collect()
    }

    fn remove_by_id(&self, id: &str) -> ModelResult<()> {
        CallCounts::bump(&self.counts.removes);
        lock(&self.store)?
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| ModelError::NotFound(format!("{}/{}", self.class, id)))
    }

    fn get_ids_for_property(&self, property: &str, value: &str) -> ModelResult<Vec<String>> {
        CallCounts::bump(&self.counts.id_lookups);
        Ok(lock(&self.store)?
            .iter()
            .filter(|(_, stored)| {
                stored.get(property).and_then(Value::to_key_string).as_deref() == Some(value)
            })
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn get_save_function(
        &self,
        before: Option<ModelHook>,
        after: Option<ModelHook>,
    ) -> ModelResult<Vec<SaveStep>> {
        let mut steps = Vec::new();
        if let Some(hook) = before {
            steps.push(SaveStep::new(format!("{}: before save", self.class), move |model| {
                hook(model)
            }));
        }

        let (store, next_id, counts) =
            (self.store.clone(), self.next_id.clone(), self.counts.clone());
        let class = self.class.clone();
        steps.push(SaveStep::new(format!("{}: write", self.class), move |model| {
            CallCounts::bump(&counts.saves);
            let key = model
                .properties()
                .primary_key()
                .map(str::to_string)
                .ok_or_else(|| ModelError::configuration(format!("{} has no primary key", class)))?;

            if model.is_new() {
                let id = next_id.fetch_add(1, Ordering::SeqCst);
                model.set_value(&key, id)?;
            }
            let id = model
                .id()
                .to_key_string()
                .ok_or_else(|| ModelError::Repository(format!("{} has no usable id", class)))?;

            let mut store = lock(&store)?;
            match store.get_mut(&id) {
                Some(existing) => {
                    let changes = model.update_values();
                    tracing::debug!("Updating {}/{} ({} fields)", class, id, changes.len());
                    existing.extend(changes);
                }
                None => {
                    bump_past(&next_id, &id);
                    tracing::debug!("Inserting {}/{}", class, id);
                    store.insert(id, model.insert_values());
                }
            }
            drop(store);

            for property in model.properties_mut().iter_mut() {
                property.clear_edit_flag();
            }
            Ok(())
        }));

        if let Some(hook) = after {
            steps.push(SaveStep::new(format!("{}: after save", self.class), move |model| {
                hook(model)
            }));
        }
        Ok(steps)
    }

    fn create_property_set(&self) -> ModelResult<PropertySet> {
        self.context
            .class(&self.class)
            .map(|blueprint| blueprint.as_ref().clone())
            .ok_or_else(|| {
                ModelError::configuration(format!("class {} is not registered", self.class))
            })
    }
}
