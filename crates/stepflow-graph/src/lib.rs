//! Stepflow graph derivation
//!
//! Derives renderable node/edge graphs from integration documents and keeps
//! viewport selection consistent across edits.
//!
//! # Core Concepts
//!
//! - [`VisualizationService`]: Document → [`FlowGraph`] (deterministic)
//! - [`ViewportStore`]: Derived graph plus selection; a commit observer
//! - [`FlowEditor`]: Session wiring store, viewport and canvas gestures
//!
//! # Example
//!
//! ```rust,ignore
//! use stepflow_graph::{EditorConfig, FlowEditor};
//!
//! let editor = FlowEditor::new(EditorConfig::default());
//! let start = editor.viewport().nodes()[0].id.clone();
//! editor.on_drop(&start, template)?;
//! ```

#![recursion_limit = "256"]
#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod derive;
mod editor;
mod error;
mod types;
mod viewport;

pub use derive::VisualizationService;
pub use editor::{EditorConfig, FlowEditor, GraphSettings};
pub use error::{EditorError, SelectionError};
pub use stepflow_store::InsertLocus;
pub use types::{
    BranchTarget, CanvasOffset, EdgeChange, EdgeKind, FlowGraph, GridPosition, HandlePlacement,
    HandleSide, LayoutMode, NodeChange, NodeKind, VizEdge, VizNode,
};
pub use viewport::ViewportStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
