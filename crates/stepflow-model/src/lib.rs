//! Stepflow document model
//!
//! Step forests, path addressing and positional identifiers for visual
//! flow editors.
//!
//! # Core Concepts
//!
//! - [`Integration`]: The canonical document (metadata plus top-level steps)
//! - [`Step`] / [`Branch`]: Forest nodes; fan-out steps nest branch sequences
//! - [`StepPath`]: Alternating step/branch indices addressing any step
//! - [`regenerate_uuids`]: Deterministic positional identifiers
//! - [`NestedSteps`]: Flattened index of branch-contained steps
//!
//! # Example
//!
//! ```rust,ignore
//! use stepflow_model::{extract_nested_steps, regenerate_uuids, set_deep_value, StepPath};
//!
//! let path: StepPath = "steps.2.branches.0.steps.1".parse()?;
//! let steps = set_deep_value(&doc.steps, &path, replacement)?;
//! let steps = regenerate_uuids(&steps, &doc.uuid_prefix());
//! let nested = extract_nested_steps(&steps);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod fingerprint;
mod identifiers;
mod integration;
mod nested;
mod path;
mod source;
mod step;
mod steps;

pub use fingerprint::DocumentFingerprint;
pub use identifiers::{assign_branch_uuids, branch_uuid, collect_uuids, regenerate_uuids};
pub use integration::{Integration, IntegrationMetadata, IntegrationParam, ViewDescriptor};
pub use nested::{extract_nested_steps, NestedStep, NestedStepKey, NestedSteps};
pub use path::{
    get_deep_value, insert_deep_value, remove_deep_value, set_deep_value, PathError, PathSegment,
    StepPath,
};
pub use source::{parse_integration, parse_value, render, DocumentError, SourceFormat};
pub use step::{Branch, Step, StepKind, StepSequence};
pub use steps::{count_steps, find_step_with_uuid, walk_steps};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
