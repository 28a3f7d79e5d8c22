//! Derived graph types
//!
//! Nodes and edges are disposable: they are regenerated from the document on
//! every commit and carry everything a canvas needs to report gestures back
//! (the step, the drop locus, the branch a delete button removes).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use stepflow_model::{Step, StepPath};
use stepflow_store::InsertLocus;

/// Flow direction on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Left to right
    #[default]
    Horizontal,
    /// Top to bottom
    Vertical,
}

impl LayoutMode {
    /// Handle sides for this direction
    #[inline]
    #[must_use]
    pub const fn handles(&self) -> HandlePlacement {
        match self {
            Self::Horizontal => HandlePlacement {
                source: HandleSide::Right,
                target: HandleSide::Left,
            },
            Self::Vertical => HandlePlacement {
                source: HandleSide::Bottom,
                target: HandleSide::Top,
            },
        }
    }
}

impl Display for LayoutMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        })
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" | "lr" => Ok(Self::Horizontal),
            "vertical" | "tb" => Ok(Self::Vertical),
            other => Err(format!("unknown layout: {other}")),
        }
    }
}

/// Side of a node where an edge attaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleSide {
    Left,
    Right,
    Top,
    Bottom,
}

/// Where outgoing and incoming edges attach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlePlacement {
    pub source: HandleSide,
    pub target: HandleSide,
}

/// Logical grid coordinates; pixel geometry is the canvas's business
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    /// Distance from the flow start along the flow direction
    pub rank: usize,
    /// Parallel track (branches fan out into separate lanes)
    pub lane: usize,
}

/// Canvas-local drag offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasOffset {
    pub x: f64,
    pub y: f64,
}

/// What a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A real step
    Step,
    /// Drop target for an empty slot
    Placeholder,
    /// Container wrapping one flow
    Group,
}

/// One node of the derived graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// The step shown (step nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    /// Path of the step (step nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<StepPath>,
    /// Where a drop lands (placeholders only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locus: Option<InsertLocus>,
    pub position: GridPosition,
    pub handles: HandlePlacement,
    /// Enclosing group node, in multi-flow mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<CanvasOffset>,
    #[serde(default)]
    pub selected: bool,
}

impl VizNode {
    /// Whether this node is a drop target
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.kind == NodeKind::Placeholder
    }

    /// UUID of the represented step
    #[inline]
    #[must_use]
    pub fn step_uuid(&self) -> Option<&str> {
        self.step.as_ref().map(|s| s.uuid.as_str())
    }
}

/// Affordance carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Plain connection
    Default,
    /// Hosts a mid-flow insertion drop target
    Insert,
    /// Hosts a button removing the branch it leads into
    Delete,
}

/// Branch removed by a delete-affordance edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTarget {
    pub parent_uuid: String,
    pub branch_index: usize,
}

/// One edge of the derived graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    /// Branch identifier, for edges entering a branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Drop locus (insert edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locus: Option<InsertLocus>,
    /// Branch removed by the button (delete edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchTarget>,
    #[serde(default)]
    pub selected: bool,
}

/// Derived nodes and edges
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

impl FlowGraph {
    /// Node by id
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&VizNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edge by id
    #[must_use]
    pub fn edge(&self, id: &str) -> Option<&VizEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Node showing the step `uuid`
    #[must_use]
    pub fn node_for_step(&self, uuid: &str) -> Option<&VizNode> {
        self.nodes.iter().find(|n| n.step_uuid() == Some(uuid))
    }

    /// Placeholder nodes
    pub fn placeholders(&self) -> impl Iterator<Item = &VizNode> {
        self.nodes.iter().filter(|n| n.is_placeholder())
    }

    /// Edges of one kind
    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &VizEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }
}

/// Canvas-reported node change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeChange {
    Position { id: String, offset: CanvasOffset },
    Select { id: String, selected: bool },
    Remove { id: String },
}

/// Canvas-reported edge change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EdgeChange {
    Select { id: String, selected: bool },
    Remove { id: String },
}
