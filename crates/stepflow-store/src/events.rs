//! Commit notifications
//!
//! Events are queued while the store lock is held, so the queue is in
//! revision order, and delivered after the lock is released. A commit issued
//! from inside an observer is queued and delivered once the current round
//! finishes, so derivations never overlap.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use stepflow_model::{Integration, NestedSteps, PathSegment, StepPath};

/// Store operation that produced a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AppendStep,
    PrependStep,
    InsertStep,
    ReplaceStep,
    ReplaceBranchParentStep,
    DeleteStep,
    DeleteBranchStep,
    DeleteSteps,
    DeleteIntegration,
    UpdateIntegration,
}

impl Operation {
    /// Operation name for logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AppendStep => "append_step",
            Self::PrependStep => "prepend_step",
            Self::InsertStep => "insert_step",
            Self::ReplaceStep => "replace_step",
            Self::ReplaceBranchParentStep => "replace_branch_parent_step",
            Self::DeleteStep => "delete_step",
            Self::DeleteBranchStep => "delete_branch_step",
            Self::DeleteSteps => "delete_steps",
            Self::DeleteIntegration => "delete_integration",
            Self::UpdateIntegration => "update_integration",
        }
    }
}

/// Why a snapshot was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitCause {
    /// A store operation
    Mutation(Operation),
    /// History step back
    Undo,
    /// History step forward
    Redo,
}

impl Display for CommitCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutation(op) => f.write_str(op.as_str()),
            Self::Undo => f.write_str("undo"),
            Self::Redo => f.write_str("redo"),
        }
    }
}

/// How a commit moved the steps that existed before it
///
/// Identifiers are positional and may be reassigned by any commit; paths
/// tracked through a [`StepEdit`] keep pointing at the same step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEdit {
    /// A step was added after every existing top-level step
    Appended,
    /// A step was inserted at this path; later siblings moved up by one
    Inserted(StepPath),
    /// The step at this path was removed; later siblings moved down by one
    Removed(StepPath),
    /// The step at this path was rewritten in place, subtree included
    Replaced(StepPath),
    /// The whole forest was swapped
    Reset,
}

impl StepEdit {
    /// Path now holding the step that was at `path` before the edit
    ///
    /// `None` if that step was removed, or lives inside a rewritten subtree.
    /// For [`StepEdit::Reset`] the old path is returned unverified.
    #[must_use]
    pub fn track(&self, path: &StepPath) -> Option<StepPath> {
        match self {
            Self::Appended | Self::Reset => Some(path.clone()),
            Self::Inserted(at) => shift(path, at, |pos, j| Some(if j >= pos { j + 1 } else { j })),
            Self::Removed(at) => shift(path, at, |pos, j| match j.cmp(&pos) {
                std::cmp::Ordering::Less => Some(j),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(j - 1),
            }),
            Self::Replaced(at) if at.is_ancestor_of(path) => None,
            Self::Replaced(_) => Some(path.clone()),
        }
    }
}

/// Re-index `path` where it runs through the sequence `at` points into
fn shift(
    path: &StepPath,
    at: &StepPath,
    remap: impl FnOnce(usize, usize) -> Option<usize>,
) -> Option<StepPath> {
    let level = at.len() - 1;
    let segments = path.segments();
    if segments.len() <= level || segments[..level] != at.segments()[..level] {
        return Some(path.clone());
    }
    let PathSegment::Step(j) = segments[level] else {
        return Some(path.clone());
    };
    let mut moved = segments.to_vec();
    moved[level] = PathSegment::Step(remap(at.position(), j)?);
    StepPath::from_segments(moved).ok()
}

/// A committed snapshot
#[derive(Debug, Clone)]
pub struct CommitEvent {
    /// Monotonic commit counter
    pub revision: u64,
    /// The committed document
    pub integration: Integration,
    /// Nested index built from exactly this document
    pub nested: Arc<NestedSteps>,
    /// What produced the commit
    pub cause: CommitCause,
    /// Structural effect on existing steps
    pub edit: StepEdit,
}

/// Receives committed snapshots
pub trait CommitObserver: Send + Sync {
    /// Called once per commit, in revision order
    fn on_commit(&self, event: &CommitEvent);
}

/// Serializes delivery of commit events to observers
#[derive(Default)]
pub(crate) struct CommitDispatcher {
    observers: RwLock<Vec<Arc<dyn CommitObserver>>>,
    pending: Mutex<VecDeque<CommitEvent>>,
    dispatching: Mutex<bool>,
}

impl CommitDispatcher {
    pub(crate) fn subscribe(&self, observer: Arc<dyn CommitObserver>) {
        self.observers.write().push(observer);
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Queue `event`; call while holding the store lock
    pub(crate) fn enqueue(&self, event: CommitEvent) {
        self.pending.lock().push_back(event);
    }

    /// Deliver everything pending unless a round is already running
    /// further up the stack or on another thread
    pub(crate) fn drain(&self) {
        {
            let mut dispatching = self.dispatching.lock();
            if *dispatching {
                return;
            }
            *dispatching = true;
        }
        let mut round = DispatchRound {
            dispatching: &self.dispatching,
            finished: false,
        };

        loop {
            let event = {
                let mut pending = self.pending.lock();
                match pending.pop_front() {
                    Some(event) => event,
                    None => {
                        // cleared under the queue lock so no event is stranded
                        *self.dispatching.lock() = false;
                        round.finished = true;
                        return;
                    }
                }
            };
            let observers = self.observers.read().clone();
            for observer in &observers {
                observer.on_commit(&event);
            }
        }
    }
}

/// Releases the dispatching flag if an observer unwinds mid-round
struct DispatchRound<'a> {
    dispatching: &'a Mutex<bool>,
    finished: bool,
}

impl Drop for DispatchRound<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.dispatching.lock() = false;
        }
    }
}

impl fmt::Debug for CommitDispatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitDispatcher")
            .field("observers", &self.observer_count())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}
