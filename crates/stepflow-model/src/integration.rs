//! The integration document
//!
//! [`Integration`] is the canonical state owned by the document store:
//! metadata plus the top-level step sequence.

use crate::source::{require_steps, DocumentError};
use crate::step::{Step, StepKind, StepSequence};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Integration name and namespace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntegrationMetadata {
    /// Integration name
    pub name: String,

    /// Target namespace
    #[serde(default)]
    pub namespace: String,
}

/// Integration-level parameter
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntegrationParam {
    /// Parameter identifier
    pub id: String,

    /// Parameter value
    #[serde(default)]
    pub value: Value,
}

/// Canonical flow document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Integration {
    /// Document identifier, also used as the UUID prefix on regeneration
    pub id: String,

    /// Target flow dialect
    pub dsl: String,

    /// Name and namespace
    #[serde(default)]
    pub metadata: IntegrationMetadata,

    /// Integration parameters
    #[serde(default)]
    pub params: Vec<IntegrationParam>,

    /// Top-level steps
    #[serde(default)]
    pub steps: StepSequence,
}

impl Integration {
    /// Empty document for a dialect (`id` is `<dsl>-1`)
    #[must_use]
    pub fn empty(
        dsl: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let dsl = dsl.into();
        Self {
            id: format!("{dsl}-1"),
            dsl,
            metadata: IntegrationMetadata {
                name: name.into(),
                namespace: namespace.into(),
            },
            params: Vec::new(),
            steps: StepSequence::new(),
        }
    }

    /// Prefix used for positional identifiers of this document
    #[inline]
    #[must_use]
    pub fn uuid_prefix(&self) -> String {
        format!("{}_", self.id)
    }

    /// Whether the flow begins with a START step
    #[inline]
    #[must_use]
    pub fn starts_with_source(&self) -> bool {
        self.steps.front().is_some_and(|s| s.kind == StepKind::Start)
    }

    /// Top-level step by UUID
    #[must_use]
    pub fn top_level_index_of(&self, uuid: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.uuid == uuid)
    }

    /// Top-level steps with identifiers stripped (see [`Step::shape`])
    #[must_use]
    pub fn step_shapes(&self) -> Vec<Step> {
        self.steps.iter().map(Step::shape).collect()
    }

    /// Shallow-merge a loosely-typed document over this one
    ///
    /// Top-level keys of `patch` replace the corresponding keys of `self`;
    /// keys absent from `patch` are kept.
    ///
    /// # Errors
    /// Returns [`DocumentError::Malformed`] if `patch` is not a mapping or
    /// has no `steps` sequence, or a decode error if the merged document
    /// does not deserialize.
    pub fn merged_with(&self, patch: &Value) -> Result<Self, DocumentError> {
        require_steps(patch)?;
        let Value::Object(patch) = patch else {
            return Err(DocumentError::malformed("document is not a mapping"));
        };

        let mut merged = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}

/// View/extension descriptor attached to steps of a given type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    /// Descriptor identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Descriptor kind (`step` or `generic`)
    #[serde(rename = "type")]
    pub kind: String,

    /// UUID of the step this view is bound to, for step views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    /// Extension entry point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
