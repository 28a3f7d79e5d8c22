//! Steps and branches
//!
//! A [`Step`] is one processing unit of an integration. Steps that fan out
//! (content-based routers, choices, splits) carry an ordered list of
//! [`Branch`]es, each holding a nested step sequence.

use im::Vector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Ordered step sequence (persistent, structurally shared between snapshots)
pub type StepSequence = Vector<Step>;

/// Role of a step within its flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    /// Flow entry point (source)
    Start,
    /// Processing step
    #[default]
    Middle,
    /// Flow exit (sink)
    End,
    /// Fan-out step hosting branches
    Branch,
}

impl StepKind {
    /// Wire name as used in documents
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Middle => "MIDDLE",
            Self::End => "END",
            Self::Branch => "BRANCH",
        }
    }
}

impl Display for StepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the step forest
///
/// `uuid` is positional: every structural mutation of the owning document
/// regenerates it, so it must not be held across edits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Positional identifier, unique within the document
    #[serde(rename = "UUID", default)]
    pub uuid: String,

    /// Catalog identifier (e.g. `kafka-source`)
    pub name: String,

    /// Role of the step
    #[serde(rename = "type", default)]
    pub kind: StepKind,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nested branches (only on fan-out steps)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vector<Branch>>,

    /// Upper arity bound (0 = no branches allowed, -1 = unbounded)
    #[serde(default)]
    pub max_branches: i32,

    /// Lower arity bound
    #[serde(default)]
    pub min_branches: i32,

    /// Owning integration identifier
    #[serde(default)]
    pub integration_id: String,

    /// Step configuration
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl Step {
    /// Create a step template with no identifier assigned
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Set arity bounds
    #[inline]
    #[must_use]
    pub fn with_arity(mut self, min_branches: i32, max_branches: i32) -> Self {
        self.min_branches = min_branches;
        self.max_branches = max_branches;
        self
    }

    /// Set owning integration
    #[inline]
    #[must_use]
    pub fn with_integration(mut self, integration_id: impl Into<String>) -> Self {
        self.integration_id = integration_id.into();
        self
    }

    /// Attach branches
    #[inline]
    #[must_use]
    pub fn with_branches(mut self, branches: impl IntoIterator<Item = Branch>) -> Self {
        self.branches = Some(branches.into_iter().collect());
        self
    }

    /// Set one parameter
    #[inline]
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Branches of this step (empty slice when none)
    #[must_use]
    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter().flat_map(|b| b.iter())
    }

    /// Number of branches
    #[inline]
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.branches.as_ref().map_or(0, Vector::len)
    }

    /// Whether the step may host branches at all
    #[inline]
    #[must_use]
    pub fn supports_branching(&self) -> bool {
        self.max_branches != 0 || self.branches.is_some()
    }

    /// Branches still required to satisfy `min_branches`
    #[inline]
    #[must_use]
    pub fn missing_branches(&self) -> usize {
        let min = usize::try_from(self.min_branches).unwrap_or(0);
        min.saturating_sub(self.branch_count())
    }

    /// Whether another branch may be added
    #[inline]
    #[must_use]
    pub fn can_add_branch(&self) -> bool {
        match usize::try_from(self.max_branches) {
            Ok(max) => self.branch_count() < max,
            // negative bound means unbounded
            Err(_) => true,
        }
    }

    /// Whether a branch may be removed without violating `min_branches`
    #[inline]
    #[must_use]
    pub fn can_remove_branch(&self) -> bool {
        let min = usize::try_from(self.min_branches).unwrap_or(0);
        self.branch_count() > min
    }

    /// Copy of this step with all identifiers cleared, recursively
    ///
    /// Two documents with equal shapes compare equal after this.
    #[must_use]
    pub fn shape(&self) -> Self {
        let mut step = self.clone();
        step.uuid.clear();
        if let Some(branches) = step.branches.as_mut() {
            for branch in branches.iter_mut() {
                branch.branch_uuid.clear();
                branch.steps = branch.steps.iter().map(Step::shape).collect();
            }
        }
        step
    }
}

/// A nested step sequence owned by a fan-out step
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Positional identifier (`<parent UUID>|branch-<index>`)
    #[serde(default)]
    pub branch_uuid: String,

    /// Branch label shown on the canvas
    #[serde(default)]
    pub identifier: String,

    /// Routing condition, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Steps of the branch
    #[serde(default)]
    pub steps: StepSequence,
}

impl Branch {
    /// Create an empty branch
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Set routing condition
    #[inline]
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set branch steps
    #[inline]
    #[must_use]
    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps = steps.into_iter().collect();
        self
    }

    /// Whether the branch holds no steps
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
