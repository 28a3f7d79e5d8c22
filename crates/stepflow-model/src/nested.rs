//! Nested-branch index
//!
//! Branch children are only reachable by walking their parent steps. The
//! [`NestedSteps`] index flattens them into a lookup keyed by parent UUID,
//! branch index and position. It is rebuilt from scratch after every
//! mutation and never patched.

use crate::path::StepPath;
use crate::step::{Step, StepSequence};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Location of a nested step relative to its parent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedStepKey {
    /// UUID of the branch-bearing parent
    pub parent_uuid: String,
    /// Branch index within the parent
    pub branch_index: usize,
    /// Position within the branch
    pub position: usize,
}

impl NestedStepKey {
    /// Create a key
    #[inline]
    #[must_use]
    pub fn new(parent_uuid: impl Into<String>, branch_index: usize, position: usize) -> Self {
        Self {
            parent_uuid: parent_uuid.into(),
            branch_index,
            position,
        }
    }
}

impl Display for NestedStepKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|branch-{}|{}",
            self.parent_uuid, self.branch_index, self.position
        )
    }
}

/// A step found below a branch-bearing step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedStep {
    /// Lookup key
    pub key: NestedStepKey,
    /// The step itself
    pub step: Step,
    /// Full path from the root sequence
    pub path: StepPath,
    /// Path of the parent step
    pub parent_path: StepPath,
    /// UUID of the top-level ancestor
    pub origin_step_uuid: String,
    /// Index of the top-level ancestor
    pub origin_index: usize,
    /// Identifier of the containing branch
    pub branch_uuid: String,
}

/// Flattened index of every nested step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedSteps {
    entries: IndexMap<NestedStepKey, NestedStep>,
    by_uuid: HashMap<String, NestedStepKey>,
}

impl NestedSteps {
    /// Empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nested steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the forest has no nested steps
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step at `position` of branch `branch_index` of `parent_uuid`
    #[must_use]
    pub fn get(&self, parent_uuid: &str, branch_index: usize, position: usize) -> Option<&NestedStep> {
        self.entries
            .get(&NestedStepKey::new(parent_uuid, branch_index, position))
    }

    /// Nested step by its own UUID
    #[must_use]
    pub fn by_uuid(&self, uuid: &str) -> Option<&NestedStep> {
        self.by_uuid.get(uuid).and_then(|key| self.entries.get(key))
    }

    /// Whether `uuid` names a nested step
    #[inline]
    #[must_use]
    pub fn contains_uuid(&self, uuid: &str) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    /// Steps of one branch, in order
    pub fn branch_steps<'a>(
        &'a self,
        parent_uuid: &'a str,
        branch_index: usize,
    ) -> impl Iterator<Item = &'a NestedStep> + 'a {
        self.entries.values().filter(move |n| {
            n.key.parent_uuid == parent_uuid && n.key.branch_index == branch_index
        })
    }

    /// All entries in traversal order
    pub fn iter(&self) -> impl Iterator<Item = &NestedStep> {
        self.entries.values()
    }

    fn insert(&mut self, nested: NestedStep) {
        self.by_uuid
            .insert(nested.step.uuid.clone(), nested.key.clone());
        self.entries.insert(nested.key.clone(), nested);
    }
}

impl Serialize for NestedSteps {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.entries.values())
    }
}

/// Build the nested index for a forest
///
/// Keys use the forest's current UUIDs, so this must run after identifier
/// regeneration.
#[must_use]
pub fn extract_nested_steps(steps: &StepSequence) -> NestedSteps {
    let mut index = NestedSteps::new();
    for (origin_index, step) in steps.iter().enumerate() {
        let origin = Origin {
            uuid: &step.uuid,
            index: origin_index,
        };
        collect(&mut index, step, &StepPath::top_level(origin_index), &origin);
    }
    index
}

struct Origin<'a> {
    uuid: &'a str,
    index: usize,
}

fn collect(index: &mut NestedSteps, parent: &Step, parent_path: &StepPath, origin: &Origin<'_>) {
    for (branch_index, branch) in parent.branches().enumerate() {
        for (position, child) in branch.steps.iter().enumerate() {
            let path = parent_path.child(branch_index, position);
            index.insert(NestedStep {
                key: NestedStepKey::new(parent.uuid.clone(), branch_index, position),
                step: child.clone(),
                path: path.clone(),
                parent_path: parent_path.clone(),
                origin_step_uuid: origin.uuid.to_string(),
                origin_index: origin.index,
                branch_uuid: branch.branch_uuid.clone(),
            });
            collect(index, child, &path, origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::regenerate_uuids;
    use crate::path::get_deep_value;
    use crate::step::{Branch, StepKind};
    use im::vector;

    fn forest() -> StepSequence {
        let inner = Step::new("filter", StepKind::Branch)
            .with_branches([Branch::new("match").with_steps([Step::new("log", StepKind::Middle)])]);
        let choice = Step::new("choice", StepKind::Branch).with_branches([
            Branch::new("when").with_steps([inner, Step::new("set-body", StepKind::Middle)]),
            Branch::new("otherwise"),
        ]);
        regenerate_uuids(
            &vector![Step::new("timer-source", StepKind::Start), choice],
            "KameletBinding-1_",
        )
    }

    #[test]
    fn empty_forest_has_empty_index() {
        let steps = regenerate_uuids(&vector![Step::new("log", StepKind::Middle)], "");
        assert!(extract_nested_steps(&steps).is_empty());
    }

    #[test]
    fn index_covers_all_depths() {
        let steps = forest();
        let index = extract_nested_steps(&steps);
        assert_eq!(index.len(), 3);

        let parent = &steps[1].uuid;
        let filter = index.get(parent, 0, 0).unwrap();
        assert_eq!(filter.step.name, "filter");
        assert_eq!(filter.origin_index, 1);
        assert_eq!(filter.origin_step_uuid, *parent);
        assert_eq!(filter.branch_uuid, format!("{parent}|branch-0"));

        let log = index.get(&filter.step.uuid, 0, 0).unwrap();
        assert_eq!(log.step.name, "log");
        assert_eq!(log.origin_index, 1);
        assert_eq!(log.parent_path, filter.path);
    }

    #[test]
    fn index_paths_resolve_to_same_step() {
        let steps = forest();
        let index = extract_nested_steps(&steps);
        for nested in index.iter() {
            assert_eq!(get_deep_value(&steps, &nested.path).unwrap(), &nested.step);
            assert_eq!(index.by_uuid(&nested.step.uuid), Some(nested));
        }
    }

    #[test]
    fn branch_steps_in_order() {
        let steps = forest();
        let index = extract_nested_steps(&steps);
        let names: Vec<_> = index
            .branch_steps(&steps[1].uuid, 0)
            .map(|n| n.step.name.as_str())
            .collect();
        assert_eq!(names, vec!["filter", "set-body"]);
        assert_eq!(index.branch_steps(&steps[1].uuid, 1).count(), 0);
    }
}
