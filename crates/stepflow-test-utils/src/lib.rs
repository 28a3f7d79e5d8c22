//! Testing utilities for Stepflow workspace
//!
//! Shared step templates, fixture documents, and proptest strategies.

#![allow(missing_docs)]

use proptest::prelude::*;
use stepflow_model::{regenerate_uuids, Branch, Integration, Step, StepKind, StepSequence};

pub const DSL: &str = "KameletBinding";

const NAMES: &[&str] = &["timer-source", "log", "set-body", "filter", "kafka-sink"];
const LEAF_KINDS: &[StepKind] = &[StepKind::Start, StepKind::Middle, StepKind::End];

pub fn source_step(name: &str) -> Step {
    Step::new(name, StepKind::Start)
}

pub fn middle_step(name: &str) -> Step {
    Step::new(name, StepKind::Middle)
}

pub fn sink_step(name: &str) -> Step {
    Step::new(name, StepKind::End)
}

/// Fan-out step with `min..=max` branches (`max` -1 = unbounded)
pub fn choice_step(min: i32, max: i32, branches: impl IntoIterator<Item = Branch>) -> Step {
    Step::new("choice", StepKind::Branch)
        .with_arity(min, max)
        .with_branches(branches)
}

/// The catalog template dropped in the append scenario
pub fn kafka_source_template() -> Step {
    Step::new("kafka-source", StepKind::Start)
        .with_integration("i1")
        .with_arity(0, 0)
}

pub fn empty_document() -> Integration {
    Integration::empty(DSL, "integration", "default")
}

/// Document with top-level steps only, identifiers assigned
pub fn document_with(steps: impl IntoIterator<Item = Step>) -> Integration {
    let mut doc = empty_document();
    let steps: StepSequence = steps.into_iter().collect();
    doc.steps = regenerate_uuids(&steps, &doc.uuid_prefix());
    doc
}

/// `timer-source → log → kafka-sink`
pub fn linear_document() -> Integration {
    document_with([
        source_step("timer-source"),
        middle_step("log"),
        sink_step("kafka-sink"),
    ])
}

/// `timer-source → log → choice{when: [filter, set-body], otherwise: [log]} → kafka-sink`
pub fn branched_document() -> Integration {
    let choice = choice_step(
        1,
        -1,
        [
            Branch::new("when")
                .with_condition("${header.type} == 'order'")
                .with_steps([middle_step("filter"), middle_step("set-body")]),
            Branch::new("otherwise").with_steps([middle_step("log")]),
        ],
    );
    document_with([
        source_step("timer-source"),
        middle_step("log"),
        choice,
        sink_step("kafka-sink"),
    ])
}

/// Arbitrary step, nesting fan-out steps up to three levels deep
pub fn arb_step() -> impl Strategy<Value = Step> {
    let leaf = (
        prop::sample::select(NAMES),
        prop::sample::select(LEAF_KINDS),
    )
        .prop_map(|(name, kind)| Step::new(name, kind));

    leaf.prop_recursive(3, 32, 3, |inner| {
        (
            prop::collection::vec(prop::collection::vec(inner, 0..3), 0..3),
            0i32..3,
        )
            .prop_map(|(branches, min)| {
                choice_step(
                    min,
                    -1,
                    branches.into_iter().enumerate().map(|(i, steps)| {
                        Branch::new(format!("route-{i}")).with_steps(steps)
                    }),
                )
            })
    })
}

/// Arbitrary top-level forest (identifiers unassigned)
pub fn arb_forest() -> impl Strategy<Value = StepSequence> {
    prop::collection::vec(arb_step(), 0..5).prop_map(|steps| steps.into_iter().collect())
}

/// Arbitrary document with identifiers assigned
pub fn arb_document() -> impl Strategy<Value = Integration> {
    arb_forest().prop_map(|steps| document_with(steps))
}
