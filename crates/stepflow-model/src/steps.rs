//! Forest traversal and lookup

use crate::path::StepPath;
use crate::step::{Step, StepSequence};

/// Visit every step depth-first (a step before its branches)
pub fn walk_steps<F>(steps: &StepSequence, visit: &mut F)
where
    F: FnMut(&StepPath, &Step),
{
    for (index, step) in steps.iter().enumerate() {
        walk_from(&StepPath::top_level(index), step, visit);
    }
}

fn walk_from<F>(path: &StepPath, step: &Step, visit: &mut F)
where
    F: FnMut(&StepPath, &Step),
{
    visit(path, step);
    for (b, branch) in step.branches().enumerate() {
        for (position, child) in branch.steps.iter().enumerate() {
            walk_from(&path.child(b, position), child, visit);
        }
    }
}

/// Find a step anywhere in the forest by UUID
#[must_use]
pub fn find_step_with_uuid<'a>(steps: &'a StepSequence, uuid: &str) -> Option<(StepPath, &'a Step)> {
    for (index, step) in steps.iter().enumerate() {
        if let Some(found) = find_from(StepPath::top_level(index), step, uuid) {
            return Some(found);
        }
    }
    None
}

fn find_from<'a>(path: StepPath, step: &'a Step, uuid: &str) -> Option<(StepPath, &'a Step)> {
    if step.uuid == uuid {
        return Some((path, step));
    }
    for (b, branch) in step.branches().enumerate() {
        for (position, child) in branch.steps.iter().enumerate() {
            if let Some(found) = find_from(path.child(b, position), child, uuid) {
                return Some(found);
            }
        }
    }
    None
}

/// Total number of steps at any depth
#[must_use]
pub fn count_steps(steps: &StepSequence) -> usize {
    let mut count = 0;
    walk_steps(steps, &mut |_, _| count += 1);
    count
}
