//! The document store
//!
//! [`DocumentStore`] is the single writer of the integration document. Every
//! steps-changing operation computes a new forest, regenerates identifiers,
//! rebuilds the nested index and commits all three in one transition under
//! the write lock. The event is queued under the lock and delivered to
//! observers after it is released.

use crate::config::StoreConfig;
use crate::error::{contract_violation, StoreError, StoreResult};
use crate::events::{CommitCause, CommitDispatcher, CommitEvent, CommitObserver, Operation, StepEdit};
use crate::history::{History, SnapshotEquality};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use stepflow_model::{
    assign_branch_uuids, extract_nested_steps, parse_value, regenerate_uuids, set_deep_value,
    Integration, NestedSteps, SourceFormat, Step, StepPath, StepSequence, ViewDescriptor,
};
use tracing::{debug, info, warn};

/// Operation set of an integration document store
pub trait IntegrationStore: Send + Sync {
    /// Current document
    fn integration(&self) -> Integration;

    /// Nested index of the current document
    fn nested_steps(&self) -> Arc<NestedSteps>;

    /// Current view descriptors
    fn views(&self) -> Vec<ViewDescriptor>;

    /// Append at the end; UUID `<name>-<top-level length>`
    ///
    /// # Errors
    /// Infallible today; kept fallible for store implementations that persist
    fn append_step(&self, step: Step) -> StoreResult<()>;

    /// Insert before `before_index`; UUID from the pre-insert length
    ///
    /// # Errors
    /// Returns [`StoreError::IndexOutOfRange`] if `before_index` > length
    fn prepend_step(&self, before_index: usize, step: Step) -> StoreResult<()>;

    /// Insert at `at_index` and regenerate
    ///
    /// # Errors
    /// Returns [`StoreError::IndexOutOfRange`] if `at_index` > length
    fn insert_step(&self, step: Step, at_index: usize) -> StoreResult<()>;

    /// Overwrite the step at `old_index`, or make `step` the new first step
    ///
    /// # Errors
    /// Returns [`StoreError::IndexOutOfRange`] for a bad `old_index`
    fn replace_step(&self, step: Step, old_index: Option<usize>) -> StoreResult<()>;

    /// Replace a step anywhere in the forest; `None` is a logged no-op
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidPath`] if the path does not resolve
    fn replace_branch_parent_step(&self, step: Step, path: Option<&StepPath>) -> StoreResult<()>;

    /// Remove the top-level step at `index`
    ///
    /// # Errors
    /// Returns [`StoreError::IndexOutOfRange`] for a bad index
    fn delete_step(&self, index: usize) -> StoreResult<()>;

    /// Substitute a modified top-level ancestor after a nested removal
    ///
    /// # Errors
    /// Returns [`StoreError::IndexOutOfRange`] for a bad index
    fn delete_branch_step(&self, root_step: Step, root_index: usize) -> StoreResult<()>;

    /// Clear the forest
    ///
    /// # Errors
    /// Infallible today
    fn delete_steps(&self) -> StoreResult<()>;

    /// Reset to the configured initial document
    ///
    /// # Errors
    /// Infallible today
    fn delete_integration(&self) -> StoreResult<()>;

    /// Replace the document, regenerating its identifiers
    ///
    /// # Errors
    /// Infallible today
    fn update_integration(&self, integration: Integration) -> StoreResult<()>;

    /// Shallow-merge a loosely-typed document over the current one
    ///
    /// # Errors
    /// Returns [`StoreError::MalformedDocument`] if it has no `steps`
    /// sequence; the current snapshot is kept.
    fn update_integration_value(&self, value: &Value) -> StoreResult<()>;

    /// Parse YAML/JSON text and merge it over the current document
    ///
    /// # Errors
    /// Returns [`StoreError::MalformedDocument`] on decode failure or
    /// missing `steps`; the current snapshot is kept.
    fn update_integration_source(&self, text: &str) -> StoreResult<()>;

    /// Replace view descriptors (no commit, no history)
    fn update_views(&self, views: Vec<ViewDescriptor>);

    /// Restore the previous snapshot; false if there is none
    fn undo(&self) -> bool;

    /// Re-apply an undone snapshot; false if there is none
    fn redo(&self) -> bool;

    /// Whether undo is possible
    fn can_undo(&self) -> bool;

    /// Whether redo is possible
    fn can_redo(&self) -> bool;

    /// Forget all history
    fn clear_history(&self);

    /// Register a commit observer
    fn subscribe(&self, observer: Arc<dyn CommitObserver>);
}

#[derive(Debug)]
struct StoreState {
    integration: Integration,
    nested: Arc<NestedSteps>,
    views: Vec<ViewDescriptor>,
    history: History<Integration>,
    revision: u64,
}

/// In-memory store holding the current snapshot and its history
#[derive(Debug)]
pub struct DocumentStore {
    config: StoreConfig,
    equality: Box<dyn SnapshotEquality>,
    state: RwLock<StoreState>,
    dispatcher: CommitDispatcher,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Store with default configuration and an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Store with custom configuration
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        let integration = config.initial_document();
        Self {
            equality: config.equality_predicate(),
            state: RwLock::new(StoreState {
                nested: Arc::new(extract_nested_steps(&integration.steps)),
                integration,
                views: Vec::new(),
                history: History::new(config.history_limit),
                revision: 0,
            }),
            dispatcher: CommitDispatcher::default(),
            config,
        }
    }

    /// Store seeded with a document (identifiers are regenerated, no history)
    #[must_use]
    pub fn with_document(config: StoreConfig, integration: Integration) -> Self {
        let store = Self::with_config(config);
        {
            let mut state = store.state.write();
            let integration = regenerated(&integration, integration.steps.clone());
            state.nested = Arc::new(extract_nested_steps(&integration.steps));
            state.integration = integration;
        }
        store
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current top-level steps
    #[must_use]
    pub fn steps(&self) -> StepSequence {
        self.state.read().integration.steps.clone()
    }

    /// Commit counter (0 for a fresh store)
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Number of undoable snapshots
    #[must_use]
    pub fn history_depth(&self) -> usize {
        self.state.read().history.depth()
    }

    /// Run the three-phase protocol and commit
    ///
    /// `compute` receives the current document and returns the next one with
    /// identifiers already assigned. On error nothing is committed.
    fn commit<F>(&self, op: Operation, edit: StepEdit, compute: F) -> StoreResult<()>
    where
        F: FnOnce(&Integration) -> StoreResult<Integration>,
    {
        {
            let mut state = self.state.write();
            let next = compute(&state.integration)?;
            let nested = Arc::new(extract_nested_steps(&next.steps));

            let previous = std::mem::replace(&mut state.integration, next);
            if self.equality.equal(&previous, &state.integration) {
                debug!(op = op.as_str(), "snapshot unchanged, history not recorded");
            } else {
                state.history.record(previous);
            }
            state.nested = Arc::clone(&nested);
            state.revision += 1;

            debug!(
                op = op.as_str(),
                revision = state.revision,
                steps = state.integration.steps.len(),
                nested = nested.len(),
                history = state.history.depth(),
                "committed"
            );

            self.dispatcher.enqueue(CommitEvent {
                revision: state.revision,
                integration: state.integration.clone(),
                nested,
                cause: CommitCause::Mutation(op),
                edit,
            });
        }
        self.dispatcher.drain();
        Ok(())
    }

    /// Commit with full identifier regeneration over `steps`
    fn commit_steps<F>(&self, op: Operation, edit: StepEdit, compute: F) -> StoreResult<()>
    where
        F: FnOnce(&StepSequence) -> StoreResult<StepSequence>,
    {
        self.commit(op, edit, |current| {
            let steps = compute(&current.steps)?;
            Ok(regenerated(current, steps))
        })
    }

    fn travel(&self, cause: CommitCause) -> bool {
        {
            let mut state = self.state.write();
            let current = state.integration.clone();
            let restored = match cause {
                CommitCause::Undo => state.history.undo(current),
                CommitCause::Redo => state.history.redo(current),
                CommitCause::Mutation(_) => None,
            };
            let Some(restored) = restored else {
                return false;
            };

            let nested = Arc::new(extract_nested_steps(&restored.steps));
            state.integration = restored;
            state.nested = Arc::clone(&nested);
            state.revision += 1;
            debug!(%cause, revision = state.revision, history = state.history.depth(), "restored snapshot");

            self.dispatcher.enqueue(CommitEvent {
                revision: state.revision,
                integration: state.integration.clone(),
                nested,
                cause,
                edit: StepEdit::Reset,
            });
        }
        self.dispatcher.drain();
        true
    }
}

/// `current` with `steps` renumbered under its own prefix
fn regenerated(current: &Integration, steps: StepSequence) -> Integration {
    Integration {
        steps: regenerate_uuids(&steps, &current.uuid_prefix()),
        ..current.clone()
    }
}

fn check_index(index: usize, len: usize, inclusive: bool) -> StoreResult<()> {
    let ok = if inclusive { index <= len } else { index < len };
    if ok {
        Ok(())
    } else {
        Err(contract_violation(StoreError::IndexOutOfRange { index, len }))
    }
}

impl IntegrationStore for DocumentStore {
    fn integration(&self) -> Integration {
        self.state.read().integration.clone()
    }

    fn nested_steps(&self) -> Arc<NestedSteps> {
        Arc::clone(&self.state.read().nested)
    }

    fn views(&self) -> Vec<ViewDescriptor> {
        self.state.read().views.clone()
    }

    fn append_step(&self, step: Step) -> StoreResult<()> {
        self.commit(Operation::AppendStep, StepEdit::Appended, |current| {
            let mut step = step;
            step.uuid = format!("{}-{}", step.name, current.steps.len());
            let mut next = current.clone();
            next.steps.push_back(assign_branch_uuids(&step));
            Ok(next)
        })
    }

    fn prepend_step(&self, before_index: usize, step: Step) -> StoreResult<()> {
        let edit = StepEdit::Inserted(StepPath::top_level(before_index));
        self.commit(Operation::PrependStep, edit, |current| {
            let len = current.steps.len();
            check_index(before_index, len, true)?;
            let mut step = step;
            // numbered from the pre-insert length, not renumbered
            step.uuid = format!("{}-{len}", step.name);
            let mut next = current.clone();
            next.steps.insert(before_index, assign_branch_uuids(&step));
            Ok(next)
        })
    }

    fn insert_step(&self, step: Step, at_index: usize) -> StoreResult<()> {
        let edit = StepEdit::Inserted(StepPath::top_level(at_index));
        self.commit_steps(Operation::InsertStep, edit, |steps| {
            check_index(at_index, steps.len(), true)?;
            let mut steps = steps.clone();
            steps.insert(at_index, step);
            Ok(steps)
        })
    }

    fn replace_step(&self, step: Step, old_index: Option<usize>) -> StoreResult<()> {
        let edit = match old_index {
            None => StepEdit::Inserted(StepPath::top_level(0)),
            Some(index) => StepEdit::Replaced(StepPath::top_level(index)),
        };
        self.commit_steps(Operation::ReplaceStep, edit, |steps| {
            let mut steps = steps.clone();
            match old_index {
                None => steps.push_front(step),
                Some(index) => {
                    check_index(index, steps.len(), false)?;
                    steps.set(index, step);
                }
            }
            Ok(steps)
        })
    }

    fn replace_branch_parent_step(&self, step: Step, path: Option<&StepPath>) -> StoreResult<()> {
        let Some(path) = path else {
            warn!(step = %step.name, "replace_branch_parent_step called without a path, ignoring");
            return Ok(());
        };
        let edit = StepEdit::Replaced(path.clone());
        self.commit_steps(Operation::ReplaceBranchParentStep, edit, |steps| {
            set_deep_value(steps, path, step).map_err(|e| contract_violation(e.into()))
        })
    }

    fn delete_step(&self, index: usize) -> StoreResult<()> {
        let edit = StepEdit::Removed(StepPath::top_level(index));
        self.commit_steps(Operation::DeleteStep, edit, |steps| {
            check_index(index, steps.len(), false)?;
            let mut steps = steps.clone();
            steps.remove(index);
            Ok(steps)
        })
    }

    fn delete_branch_step(&self, root_step: Step, root_index: usize) -> StoreResult<()> {
        let edit = StepEdit::Replaced(StepPath::top_level(root_index));
        self.commit_steps(Operation::DeleteBranchStep, edit, |steps| {
            check_index(root_index, steps.len(), false)?;
            let mut steps = steps.clone();
            steps.set(root_index, root_step);
            Ok(steps)
        })
    }

    fn delete_steps(&self) -> StoreResult<()> {
        self.commit_steps(Operation::DeleteSteps, StepEdit::Reset, |_| Ok(StepSequence::new()))
    }

    fn delete_integration(&self) -> StoreResult<()> {
        info!(dsl = %self.config.dsl, "resetting integration");
        self.commit(Operation::DeleteIntegration, StepEdit::Reset, |_| {
            Ok(self.config.initial_document())
        })
    }

    fn update_integration(&self, integration: Integration) -> StoreResult<()> {
        self.commit(Operation::UpdateIntegration, StepEdit::Reset, |current| {
            Ok(Integration {
                steps: regenerate_uuids(&integration.steps, &current.uuid_prefix()),
                ..integration
            })
        })
    }

    fn update_integration_value(&self, value: &Value) -> StoreResult<()> {
        self.commit(Operation::UpdateIntegration, StepEdit::Reset, |current| {
            let merged = current.merged_with(value).map_err(|e| {
                warn!(error = %e, "rejected incoming document");
                StoreError::from(e)
            })?;
            Ok(Integration {
                steps: regenerate_uuids(&merged.steps, &current.uuid_prefix()),
                ..merged
            })
        })
    }

    fn update_integration_source(&self, text: &str) -> StoreResult<()> {
        let value = parse_value(text, SourceFormat::detect(text)).map_err(|e| {
            warn!(error = %e, "could not parse incoming document");
            StoreError::from(e)
        })?;
        self.update_integration_value(&value)
    }

    fn update_views(&self, views: Vec<ViewDescriptor>) {
        debug!(views = views.len(), "views updated");
        self.state.write().views = views;
    }

    fn undo(&self) -> bool {
        self.travel(CommitCause::Undo)
    }

    fn redo(&self) -> bool {
        self.travel(CommitCause::Redo)
    }

    fn can_undo(&self) -> bool {
        self.state.read().history.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.state.read().history.can_redo()
    }

    fn clear_history(&self) {
        self.state.write().history.clear();
    }

    fn subscribe(&self, observer: Arc<dyn CommitObserver>) {
        self.dispatcher.subscribe(observer);
    }
}
