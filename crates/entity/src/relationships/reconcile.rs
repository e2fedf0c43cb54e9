//! Save reconciliation - ordered save plans for aggregates
//!
//! A plan is a list of steps tagged with a phase. Steps are built before
//! anything runs and receive the record they act on when executed, so a
//! plan can be assembled while the parent has no key yet.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::ModelHook;
use crate::error::ModelResult;
use crate::model::Model;
use crate::repository::Repository;

/// Position of a step within a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SavePhase {
    Before,
    Main,
    After,
}

/// Whether a relation's plan runs before or after the parent's own save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOrder {
    /// The parent needs the related record's key (has-one)
    BeforeParent,
    /// The related records need the parent's key (has-many)
    AfterParent,
}

pub type StepFn = Box<dyn FnOnce(&mut Model) -> ModelResult<()> + Send>;

/// One atomic unit of a save
pub struct SaveStep {
    label: String,
    action: StepFn,
}

impl SaveStep {
    pub fn new<F>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(&mut Model) -> ModelResult<()> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(self, target: &mut Model) -> ModelResult<()> {
        tracing::trace!("Running save step '{}' on {}", self.label, target.handle());
        (self.action)(target)
    }
}

impl fmt::Debug for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveStep").field("label", &self.label).finish()
    }
}

/// Ordered save steps for one record and its relations
#[derive(Debug)]
pub struct SavePlan {
    order: SaveOrder,
    steps: Vec<(SavePhase, SaveStep)>,
}

impl SavePlan {
    pub fn new(order: SaveOrder) -> Self {
        Self {
            order,
            steps: Vec::new(),
        }
    }

    pub fn order(&self) -> SaveOrder {
        self.order
    }

    pub fn push(&mut self, phase: SavePhase, step: SaveStep) {
        self.steps.push((phase, step));
    }

    pub fn step<F>(mut self, phase: SavePhase, label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(&mut Model) -> ModelResult<()> + Send + 'static,
    {
        self.push(phase, SaveStep::new(label, action));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Step labels in execution order
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<(SavePhase, &str)> = self
            .steps
            .iter()
            .map(|(phase, step)| (*phase, step.label()))
            .collect();
        labels.sort_by_key(|(phase, _)| *phase);
        labels.into_iter().map(|(_, label)| label.to_string()).collect()
    }

    /// Steps in execution order: by phase, registration order within a phase
    pub fn into_steps(self) -> Vec<SaveStep> {
        let mut steps = self.steps;
        steps.sort_by_key(|(phase, _)| *phase);
        steps.into_iter().map(|(_, step)| step).collect()
    }

    /// Run every step against `target`, stopping at the first failure
    pub fn execute(self, target: &mut Model) -> ModelResult<()> {
        for step in self.into_steps() {
            step.run(target)?;
        }
        Ok(())
    }

    /// Full plan for an aggregate
    ///
    /// Relations that must be saved first (has-one), then the record's own
    /// repository steps wrapped in its before/after-save hooks, then the
    /// relations that need the record's key (has-many).
    pub fn for_aggregate(model: &Model, repository: &dyn Repository) -> ModelResult<SavePlan> {
        let mut plan = SavePlan::new(SaveOrder::AfterParent);
        let mut after_parent = Vec::new();

        for property in model.properties().iter() {
            let Some(provider) = property.provider() else {
                continue;
            };
            let relation_plan = provider.save_plan(model, property.name())?;
            match relation_plan.order() {
                SaveOrder::BeforeParent => {
                    for step in relation_plan.into_steps() {
                        plan.push(SavePhase::Before, step);
                    }
                }
                SaveOrder::AfterParent => after_parent.push(relation_plan),
            }
        }

        let before = combine_hooks(model.properties().before_save_hooks());
        let after = combine_hooks(model.properties().after_save_hooks());
        for step in repository.get_save_function(before, after)? {
            plan.push(SavePhase::Main, step);
        }

        for relation_plan in after_parent {
            for step in relation_plan.into_steps() {
                plan.push(SavePhase::After, step);
            }
        }

        tracing::debug!(
            "Built save plan for {} {} with {} steps",
            model.class(),
            model.handle(),
            plan.len()
        );
        Ok(plan)
    }
}

/// Run several hooks as one, in order
pub fn combine_hooks(hooks: &[ModelHook]) -> Option<ModelHook> {
    match hooks {
        [] => None,
        [single] => Some(single.clone()),
        many => {
            let hooks = many.to_vec();
            let combined: ModelHook = Arc::new(move |model: &mut Model| {
                for hook in &hooks {
                    hook(model)?;
                }
                Ok(())
            });
            Some(combined)
        }
    }
}

/// Ids that were stored for the parent but are no longer held
///
/// Keeps the order of `existing`.
pub fn orphan_ids(existing: &[String], current: &[String]) -> Vec<String> {
    let held: HashSet<&str> = current.iter().map(String::as_str).collect();
    existing
        .iter()
        .filter(|id| !held.contains(id.as_str()))
        .cloned()
        .collect()
}
