//! Positional identifier assignment
//!
//! Every structural mutation renumbers the whole forest. Identifiers are
//! `prefix + name + "-" + counter` with a single counter running across the
//! forest, so they are unique by construction and depend only on shape.

use crate::step::{Branch, Step, StepSequence};

/// Reassign every step and branch identifier in `steps`
///
/// Order: the steps of a sequence are numbered first, then each step's
/// branches are visited in declaration order, recursively by the same rule.
/// Each branch gets `<parent UUID>|branch-<index>`.
///
/// The input is left untouched; applying this twice yields identical output.
#[must_use]
pub fn regenerate_uuids(steps: &StepSequence, prefix: &str) -> StepSequence {
    let mut counter = 0;
    number_sequence(steps, prefix, &mut counter)
}

/// Number a single step's branch subtree, scoped under the step's own UUID
///
/// The step itself keeps its identifier. Used when a step is added without
/// renumbering the rest of the forest.
#[must_use]
pub fn assign_branch_uuids(step: &Step) -> Step {
    let mut counter = 0;
    let scope = format!("{}|", step.uuid);
    let mut step = step.clone();
    number_branches(&mut step, &scope, &mut counter);
    step
}

/// Identifier of branch `index` of the step `parent_uuid`
#[inline]
#[must_use]
pub fn branch_uuid(parent_uuid: &str, index: usize) -> String {
    format!("{parent_uuid}|branch-{index}")
}

/// All step identifiers in traversal order
#[must_use]
pub fn collect_uuids(steps: &StepSequence) -> Vec<String> {
    let mut out = Vec::new();
    crate::steps::walk_steps(steps, &mut |_, step| out.push(step.uuid.clone()));
    out
}

fn number_sequence(steps: &StepSequence, prefix: &str, counter: &mut usize) -> StepSequence {
    let mut numbered: StepSequence = steps
        .iter()
        .map(|step| {
            let mut step = step.clone();
            step.uuid = format!("{prefix}{}-{counter}", step.name);
            *counter += 1;
            step
        })
        .collect();

    for step in numbered.iter_mut() {
        number_branches(step, prefix, counter);
    }
    numbered
}

fn number_branches(step: &mut Step, prefix: &str, counter: &mut usize) {
    let parent = step.uuid.clone();
    if let Some(branches) = step.branches.as_mut() {
        for (index, branch) in branches.iter_mut().enumerate() {
            *branch = Branch {
                branch_uuid: branch_uuid(&parent, index),
                steps: number_sequence(&branch.steps, prefix, counter),
                ..branch.clone()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use im::vector;
    use std::collections::HashSet;

    fn forest() -> StepSequence {
        let choice = Step::new("choice", StepKind::Branch).with_branches([
            Branch::new("when").with_steps([Step::new("log", StepKind::Middle)]),
            Branch::new("otherwise").with_steps([Step::new("log", StepKind::Middle)]),
        ]);
        vector![
            Step::new("timer-source", StepKind::Start),
            choice,
            Step::new("kafka-sink", StepKind::End),
        ]
    }

    #[test]
    fn regenerate_numbers_sequence_before_branches() {
        let steps = regenerate_uuids(&forest(), "KameletBinding-1_");
        assert_eq!(steps[0].uuid, "KameletBinding-1_timer-source-0");
        assert_eq!(steps[1].uuid, "KameletBinding-1_choice-1");
        assert_eq!(steps[2].uuid, "KameletBinding-1_kafka-sink-2");

        let branches: Vec<_> = steps[1].branches().collect();
        assert_eq!(branches[0].branch_uuid, "KameletBinding-1_choice-1|branch-0");
        assert_eq!(branches[0].steps[0].uuid, "KameletBinding-1_log-3");
        assert_eq!(branches[1].steps[0].uuid, "KameletBinding-1_log-4");
    }

    #[test]
    fn regenerate_is_pure_and_idempotent() {
        let input = forest();
        let once = regenerate_uuids(&input, "p_");
        let twice = regenerate_uuids(&once, "p_");
        assert_eq!(once, twice);
        assert!(input.iter().all(|s| s.uuid.is_empty()));
    }

    #[test]
    fn regenerate_yields_unique_ids() {
        let steps = regenerate_uuids(&forest(), "");
        let uuids = collect_uuids(&steps);
        let unique: HashSet<_> = uuids.iter().collect();
        assert_eq!(uuids.len(), 5);
        assert_eq!(unique.len(), uuids.len());
    }

    #[test]
    fn assign_branch_uuids_scopes_under_step() {
        let mut choice = forest()[1].clone();
        choice.uuid = "choice-4".into();
        let step = assign_branch_uuids(&choice);
        assert_eq!(step.uuid, "choice-4");
        let branch = step.branches().next().unwrap();
        assert_eq!(branch.branch_uuid, "choice-4|branch-0");
        assert_eq!(branch.steps[0].uuid, "choice-4|log-0");
    }
}
