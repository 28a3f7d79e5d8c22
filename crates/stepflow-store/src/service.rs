//! Step-level operations over a store
//!
//! [`StepsService`] answers UUID lookups and turns canvas gestures (delete a
//! step, delete a branch, drop a template, save a config form) into the
//! store's structural operations.

use crate::error::{contract_violation, StoreError, StoreResult};
use crate::store::IntegrationStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use stepflow_model::{
    find_step_with_uuid, get_deep_value, insert_deep_value, remove_deep_value, walk_steps, Branch,
    Step, StepPath, StepSequence, ViewDescriptor,
};
use tracing::debug;

/// Where a dropped step goes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InsertLocus {
    /// In front of the flow (start placeholder)
    Start,
    /// Before the step at this path (or appended when the position equals
    /// the sequence length)
    Before { path: StepPath },
    /// Into an existing empty branch
    EmptyBranch {
        parent_uuid: String,
        branch_index: usize,
    },
    /// As the first step of a new branch of a step below `minBranches`
    MissingBranch { parent_uuid: String },
}

/// Produces view descriptors for the steps of a document
pub trait ViewProvider: Send + Sync {
    /// Descriptors for `steps`
    fn views_for(&self, steps: &StepSequence) -> Vec<ViewDescriptor>;
}

/// View template registered for a step name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewTemplate {
    /// Display name
    pub name: String,
    /// Extension entry point
    #[serde(default)]
    pub url: Option<String>,
}

/// Fixed catalog of step views plus generic views
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticViewCatalog {
    /// Templates keyed by step name
    #[serde(default)]
    pub steps: BTreeMap<String, Vec<ViewTemplate>>,
    /// Views not bound to any step
    #[serde(default)]
    pub generic: Vec<ViewTemplate>,
}

impl StaticViewCatalog {
    /// Register a view for a step name
    #[must_use]
    pub fn with_step_view(mut self, step_name: impl Into<String>, template: ViewTemplate) -> Self {
        self.steps.entry(step_name.into()).or_default().push(template);
        self
    }

    /// Register a generic view
    #[must_use]
    pub fn with_generic_view(mut self, template: ViewTemplate) -> Self {
        self.generic.push(template);
        self
    }
}

impl ViewProvider for StaticViewCatalog {
    fn views_for(&self, steps: &StepSequence) -> Vec<ViewDescriptor> {
        let mut views = Vec::new();
        walk_steps(steps, &mut |_, step| {
            for (i, template) in self.steps.get(&step.name).into_iter().flatten().enumerate() {
                views.push(ViewDescriptor {
                    id: format!("{}-view-{i}", step.uuid),
                    name: template.name.clone(),
                    kind: "step".to_string(),
                    step: Some(step.uuid.clone()),
                    url: template.url.clone(),
                });
            }
        });
        views.extend(self.generic.iter().enumerate().map(|(i, template)| ViewDescriptor {
            id: format!("generic-view-{i}"),
            name: template.name.clone(),
            kind: "generic".to_string(),
            step: None,
            url: template.url.clone(),
        }));
        views
    }
}

/// Step-level operations bound to a store
pub struct StepsService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: IntegrationStore + ?Sized> StepsService<S> {
    /// Bind to a store
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Step with `uuid` at any depth
    #[must_use]
    pub fn find_step_with_uuid(&self, uuid: &str) -> Option<Step> {
        let doc = self.store.integration();
        if let Some(index) = doc.top_level_index_of(uuid) {
            return Some(doc.steps[index].clone());
        }
        self.store
            .nested_steps()
            .by_uuid(uuid)
            .map(|nested| nested.step.clone())
    }

    /// Top-level index of `uuid`
    #[must_use]
    pub fn find_step_idx_with_uuid(&self, uuid: &str) -> Option<usize> {
        self.store.integration().top_level_index_of(uuid)
    }

    /// Delete a step at any depth
    ///
    /// Top-level steps go through `delete_step`; nested ones are removed from
    /// their top-level ancestor, which is then substituted.
    ///
    /// # Errors
    /// Returns [`StoreError::StepNotFound`] for an unknown UUID
    pub fn delete_step_by_uuid(&self, uuid: &str) -> StoreResult<()> {
        if let Some(index) = self.find_step_idx_with_uuid(uuid) {
            return self.store.delete_step(index);
        }
        let nested = self.store.nested_steps();
        let entry = nested
            .by_uuid(uuid)
            .ok_or_else(|| StoreError::StepNotFound(uuid.to_string()))?;

        let steps = self.store.integration().steps;
        let pruned = remove_deep_value(&steps, &entry.path).map_err(|e| contract_violation(e.into()))?;
        debug!(uuid, origin = entry.origin_index, "deleting nested step");
        self.store
            .delete_branch_step(pruned[entry.origin_index].clone(), entry.origin_index)
    }

    /// Remove branch `branch_index` of the step `parent_uuid`
    ///
    /// # Errors
    /// Returns error if the step or branch does not exist, or if removal
    /// would violate `minBranches`
    pub fn delete_branch(&self, parent_uuid: &str, branch_index: usize) -> StoreResult<()> {
        let (path, parent) = self.locate(parent_uuid)?;
        if branch_index >= parent.branch_count() {
            return Err(contract_violation(StoreError::BranchNotFound {
                uuid: parent_uuid.to_string(),
                branch_index,
            }));
        }
        if !parent.can_remove_branch() {
            return Err(contract_violation(StoreError::BranchArity {
                uuid: parent_uuid.to_string(),
                min: parent.min_branches,
            }));
        }

        let mut updated = parent;
        if let Some(branches) = updated.branches.as_mut() {
            branches.remove(branch_index);
        }
        self.store.replace_branch_parent_step(updated, Some(&path))
    }

    /// Merge `values` into the parameters of step `uuid`
    ///
    /// # Errors
    /// Returns [`StoreError::StepNotFound`] for an unknown UUID
    pub fn update_step_parameters(&self, uuid: &str, values: BTreeMap<String, Value>) -> StoreResult<()> {
        let (path, step) = self.locate(uuid)?;
        let mut updated = step;
        updated.parameters.extend(values);
        if path.is_top_level() {
            self.store.replace_step(updated, Some(path.root_index()))
        } else {
            self.store.replace_branch_parent_step(updated, Some(&path))
        }
    }

    /// Insert `step` at a drop target
    ///
    /// # Errors
    /// Returns error if the locus no longer resolves in the current document
    pub fn insert_at(&self, locus: &InsertLocus, step: Step) -> StoreResult<()> {
        match locus {
            InsertLocus::Start => self.store.replace_step(step, None),
            InsertLocus::Before { path } if path.is_top_level() => {
                self.store.insert_step(step, path.position())
            }
            InsertLocus::Before { path } => {
                let steps = self.store.integration().steps;
                let inserted =
                    insert_deep_value(&steps, path, step).map_err(|e| contract_violation(e.into()))?;
                let root = path.root_index();
                self.store.delete_branch_step(inserted[root].clone(), root)
            }
            InsertLocus::EmptyBranch {
                parent_uuid,
                branch_index,
            } => {
                let (path, parent) = self.locate(parent_uuid)?;
                if *branch_index >= parent.branch_count() {
                    return Err(contract_violation(StoreError::BranchNotFound {
                        uuid: parent_uuid.clone(),
                        branch_index: *branch_index,
                    }));
                }
                self.insert_at(
                    &InsertLocus::Before {
                        path: path.child(*branch_index, 0),
                    },
                    step,
                )
            }
            InsertLocus::MissingBranch { parent_uuid } => {
                let (path, parent) = self.locate(parent_uuid)?;
                let mut updated = parent;
                let index = updated.branch_count();
                let branch = Branch::new(format!("branch-{index}")).with_steps([step]);
                updated.branches.get_or_insert_with(Default::default).push_back(branch);
                self.store.replace_branch_parent_step(updated, Some(&path))
            }
        }
    }

    /// Recompute view descriptors for the current document
    pub fn refresh_views(&self, provider: &dyn ViewProvider) {
        let views = provider.views_for(&self.store.integration().steps);
        self.store.update_views(views);
    }

    fn locate(&self, uuid: &str) -> StoreResult<(StepPath, Step)> {
        let steps = self.store.integration().steps;
        let (path, _) = find_step_with_uuid(&steps, uuid)
            .ok_or_else(|| StoreError::StepNotFound(uuid.to_string()))?;
        let step = get_deep_value(&steps, &path)
            .map_err(|e| contract_violation(e.into()))?
            .clone();
        Ok((path, step))
    }
}

impl<S: ?Sized> Clone for StepsService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for StepsService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepsService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentStore;
    use stepflow_model::StepKind;

    fn store_with_choice() -> Arc<DocumentStore> {
        let store = Arc::new(DocumentStore::new());
        store
            .insert_step(Step::new("timer-source", StepKind::Start), 0)
            .unwrap();
        let choice = Step::new("choice", StepKind::Branch)
            .with_arity(1, -1)
            .with_branches([
                Branch::new("when").with_steps([Step::new("log", StepKind::Middle)]),
                Branch::new("otherwise"),
            ]);
        store.insert_step(choice, 1).unwrap();
        store
    }

    #[test]
    fn find_nested_and_top_level() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        let choice_uuid = store.steps()[1].uuid.clone();
        assert_eq!(service.find_step_idx_with_uuid(&choice_uuid), Some(1));

        let log_uuid = store.nested_steps().get(&choice_uuid, 0, 0).unwrap().step.uuid.clone();
        assert_eq!(service.find_step_with_uuid(&log_uuid).unwrap().name, "log");
        assert_eq!(service.find_step_idx_with_uuid(&log_uuid), None);
        assert!(service.find_step_with_uuid("nope").is_none());
    }

    #[test]
    fn delete_nested_step_substitutes_origin() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        let choice_uuid = store.steps()[1].uuid.clone();
        let log_uuid = store.nested_steps().get(&choice_uuid, 0, 0).unwrap().step.uuid.clone();

        service.delete_step_by_uuid(&log_uuid).unwrap();
        let steps = store.steps();
        assert_eq!(steps.len(), 2);
        assert!(steps[1].branches().all(Branch::is_empty));
        assert!(store.nested_steps().is_empty());

        assert!(matches!(
            service.delete_step_by_uuid("nope"),
            Err(StoreError::StepNotFound(_))
        ));
    }

    #[test]
    fn delete_branch_respects_min() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        let choice_uuid = store.steps()[1].uuid.clone();

        service.delete_branch(&choice_uuid, 1).unwrap();
        assert_eq!(store.steps()[1].branch_count(), 1);

        #[cfg(not(feature = "strict-contracts"))]
        {
            let choice_uuid = store.steps()[1].uuid.clone();
            assert!(matches!(
                service.delete_branch(&choice_uuid, 0),
                Err(StoreError::BranchArity { min: 1, .. })
            ));
        }
    }

    #[test]
    fn update_parameters_merges() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        let uuid = store.steps()[0].uuid.clone();

        let values = BTreeMap::from([("period".to_string(), Value::from(500))]);
        service.update_step_parameters(&uuid, values).unwrap();
        assert_eq!(store.steps()[0].parameters["period"], Value::from(500));
    }

    #[test]
    fn unknown_uuid_is_rejected_without_commit() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        let revision = store.revision();

        let values = BTreeMap::from([("period".to_string(), Value::from(500))]);
        assert!(matches!(
            service.update_step_parameters("nope", values),
            Err(StoreError::StepNotFound(_))
        ));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn insert_into_empty_and_missing_branches() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        let choice_uuid = store.steps()[1].uuid.clone();

        service
            .insert_at(
                &InsertLocus::EmptyBranch {
                    parent_uuid: choice_uuid,
                    branch_index: 1,
                },
                Step::new("set-body", StepKind::Middle),
            )
            .unwrap();
        let branches: Vec<_> = store.steps()[1].branches().cloned().collect();
        assert_eq!(branches[1].steps[0].name, "set-body");

        let choice_uuid = store.steps()[1].uuid.clone();
        service
            .insert_at(
                &InsertLocus::MissingBranch {
                    parent_uuid: choice_uuid,
                },
                Step::new("marshal", StepKind::Middle),
            )
            .unwrap();
        assert_eq!(store.steps()[1].branch_count(), 3);
        assert_eq!(store.nested_steps().len(), 3);
    }

    #[test]
    fn insert_before_top_level_and_start() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        service
            .insert_at(
                &InsertLocus::Before {
                    path: StepPath::top_level(2),
                },
                Step::new("kafka-sink", StepKind::End),
            )
            .unwrap();
        assert_eq!(store.steps()[2].name, "kafka-sink");

        service
            .insert_at(&InsertLocus::Start, Step::new("kafka-source", StepKind::Start))
            .unwrap();
        assert_eq!(store.steps()[0].name, "kafka-source");
        assert_eq!(store.steps().len(), 4);
    }

    #[test]
    fn catalog_views_bind_to_steps() {
        let store = store_with_choice();
        let service = StepsService::new(store.clone());
        let catalog = StaticViewCatalog::default()
            .with_step_view(
                "log",
                ViewTemplate {
                    name: "Log viewer".into(),
                    url: None,
                },
            )
            .with_generic_view(ViewTemplate {
                name: "Overview".into(),
                url: Some("/overview.js".into()),
            });

        service.refresh_views(&catalog);
        let views = store.views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].kind, "step");
        assert_eq!(views[1].kind, "generic");
        let log_uuid = store.nested_steps().iter().next().unwrap().step.uuid.clone();
        assert_eq!(views[0].step.as_deref(), Some(log_uuid.as_str()));
    }
}
