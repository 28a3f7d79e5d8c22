//! Viewport and selection state
//!
//! [`ViewportStore`] holds the derived graph and the transient selection.
//! It subscribes to the document store and, on every commit, re-derives the
//! graph and carries the selection across the commit's [`StepEdit`].
//! Identifiers are positional, so the selection is tracked by path: a
//! selected step that was removed, or that sat inside a rewritten subtree,
//! is dropped even when another step now carries its old UUID.

use crate::derive::VisualizationService;
use crate::error::SelectionError;
use crate::types::{EdgeChange, FlowGraph, LayoutMode, NodeChange, VizEdge, VizNode};
use parking_lot::RwLock;
use std::sync::Arc;
use stepflow_model::{find_step_with_uuid, get_deep_value, Integration, NestedSteps, Step, StepPath};
use stepflow_store::{CommitEvent, CommitObserver, StepEdit};
use tracing::debug;

/// Selected step and where it lives
#[derive(Debug, Clone)]
struct Selection {
    path: StepPath,
    step: Step,
}

#[derive(Debug)]
struct ViewportState {
    service: VisualizationService,
    integration: Integration,
    nested: Arc<NestedSteps>,
    graph: FlowGraph,
    selection: Option<Selection>,
    panel_expanded: bool,
    revision: u64,
}

impl ViewportState {
    fn rederive(&mut self) {
        self.graph = self.service.derive(&self.integration);
        self.mark_selected();
    }

    fn mark_selected(&mut self) {
        let selected = self.selection.as_ref().map(|s| s.step.uuid.as_str());
        for node in &mut self.graph.nodes {
            node.selected = selected.is_some() && node.step_uuid() == selected;
        }
    }

    fn locate(&self, uuid: &str) -> Option<Selection> {
        if let Some(nested) = self.nested.by_uuid(uuid) {
            return Some(Selection {
                path: nested.path.clone(),
                step: nested.step.clone(),
            });
        }
        find_step_with_uuid(&self.integration.steps, uuid).map(|(path, step)| Selection {
            path,
            step: step.clone(),
        })
    }

    fn clear_selection(&mut self) {
        self.selection = None;
        self.panel_expanded = false;
    }

    /// Carry the selection across `edit`; a lost selection is cleared
    fn reconcile(&mut self, edit: &StepEdit) -> Result<(), SelectionError> {
        let Some(previous) = self.selection.take() else {
            return Ok(());
        };
        let carried = edit.track(&previous.path).and_then(|path| {
            let step = get_deep_value(&self.integration.steps, &path).ok()?.clone();
            let same = match edit {
                // rewritten in place, e.g. saved parameters
                StepEdit::Replaced(at) if *at == path => true,
                StepEdit::Reset => step == previous.step,
                _ => step.shape() == previous.step.shape(),
            };
            same.then_some(Selection { path, step })
        });

        if carried.is_some() {
            self.selection = carried;
            Ok(())
        } else {
            self.clear_selection();
            Err(SelectionError::Stale(previous.step.uuid))
        }
    }
}

/// Derived graph plus selection
#[derive(Debug)]
pub struct ViewportStore {
    state: RwLock<ViewportState>,
}

impl ViewportStore {
    /// Create for an initial document
    #[must_use]
    pub fn new(
        service: VisualizationService,
        integration: Integration,
        nested: Arc<NestedSteps>,
    ) -> Self {
        let graph = service.derive(&integration);
        Self {
            state: RwLock::new(ViewportState {
                service,
                integration,
                nested,
                graph,
                selection: None,
                panel_expanded: false,
                revision: 0,
            }),
        }
    }

    /// Current graph
    #[must_use]
    pub fn graph(&self) -> FlowGraph {
        self.state.read().graph.clone()
    }

    /// Current nodes
    #[must_use]
    pub fn nodes(&self) -> Vec<VizNode> {
        self.state.read().graph.nodes.clone()
    }

    /// Current edges
    #[must_use]
    pub fn edges(&self) -> Vec<VizEdge> {
        self.state.read().graph.edges.clone()
    }

    /// Selected step UUID
    #[must_use]
    pub fn selected_uuid(&self) -> Option<String> {
        self.state
            .read()
            .selection
            .as_ref()
            .map(|s| s.step.uuid.clone())
    }

    /// Snapshot of the selected step
    #[must_use]
    pub fn selected_step(&self) -> Option<Step> {
        self.state.read().selection.as_ref().map(|s| s.step.clone())
    }

    /// Path of the selected step
    #[must_use]
    pub fn selected_path(&self) -> Option<StepPath> {
        self.state.read().selection.as_ref().map(|s| s.path.clone())
    }

    /// Whether the detail panel is open
    #[must_use]
    pub fn is_panel_expanded(&self) -> bool {
        self.state.read().panel_expanded
    }

    /// Current layout
    #[must_use]
    pub fn layout(&self) -> LayoutMode {
        self.state.read().service.layout()
    }

    /// Whether flows are grouped
    #[must_use]
    pub fn multiple_flows(&self) -> bool {
        self.state.read().service.multiple_flows()
    }

    /// Select a step by UUID
    ///
    /// # Errors
    /// Returns [`SelectionError::Stale`] (and clears the selection) if the
    /// UUID does not resolve
    pub fn select(&self, uuid: &str) -> Result<(), SelectionError> {
        let mut state = self.state.write();
        let result = match state.locate(uuid) {
            Some(selection) => {
                state.selection = Some(selection);
                Ok(())
            }
            None => {
                state.clear_selection();
                Err(SelectionError::Stale(uuid.to_string()))
            }
        };
        state.mark_selected();
        result
    }

    /// Drop the selection and collapse the panel
    pub fn clear_selection(&self) {
        let mut state = self.state.write();
        state.clear_selection();
        state.mark_selected();
    }

    /// Open or close the detail panel
    pub fn set_panel_expanded(&self, expanded: bool) {
        self.state.write().panel_expanded = expanded;
    }

    /// Close the panel and forget the selection
    pub fn close_panel(&self) {
        let mut state = self.state.write();
        state.clear_selection();
        state.mark_selected();
    }

    /// Switch layout and re-derive
    pub fn set_layout(&self, layout: LayoutMode) {
        let mut state = self.state.write();
        let multiple = state.service.multiple_flows();
        state.service = VisualizationService::new(layout, multiple);
        state.rederive();
    }

    /// Toggle flow grouping and re-derive
    pub fn set_multiple_flows(&self, multiple_flows: bool) {
        let mut state = self.state.write();
        let layout = state.service.layout();
        state.service = VisualizationService::new(layout, multiple_flows);
        state.rederive();
    }

    /// Apply canvas-local node changes (drag, select, remove)
    ///
    /// Removal only drops the node from the current graph; the document is
    /// changed through the store.
    pub fn apply_node_changes(&self, changes: Vec<NodeChange>) {
        let mut state = self.state.write();
        for change in changes {
            match change {
                NodeChange::Position { id, offset } => {
                    if let Some(node) = state.graph.nodes.iter_mut().find(|n| n.id == id) {
                        node.offset = Some(offset);
                    }
                }
                NodeChange::Select { id, selected } => {
                    if let Some(node) = state.graph.nodes.iter_mut().find(|n| n.id == id) {
                        node.selected = selected;
                    }
                }
                NodeChange::Remove { id } => {
                    state.graph.nodes.retain(|n| n.id != id);
                    state.graph.edges.retain(|e| e.source != id && e.target != id);
                }
            }
        }
    }

    /// Apply canvas-local edge changes
    pub fn apply_edge_changes(&self, changes: Vec<EdgeChange>) {
        let mut state = self.state.write();
        for change in changes {
            match change {
                EdgeChange::Select { id, selected } => {
                    if let Some(edge) = state.graph.edges.iter_mut().find(|e| e.id == id) {
                        edge.selected = selected;
                    }
                }
                EdgeChange::Remove { id } => state.graph.edges.retain(|e| e.id != id),
            }
        }
    }

    /// Replace the document, re-derive and carry the selection across `edit`
    pub fn refresh(&self, integration: Integration, nested: Arc<NestedSteps>, edit: &StepEdit) {
        let mut state = self.state.write();
        state.integration = integration;
        state.nested = nested;
        if let Err(err) = state.reconcile(edit) {
            debug!(error = %err, "selection cleared");
        }
        state.rederive();
    }
}

impl CommitObserver for ViewportStore {
    fn on_commit(&self, event: &CommitEvent) {
        {
            let mut state = self.state.write();
            if event.revision <= state.revision {
                debug!(revision = event.revision, seen = state.revision, "stale commit ignored");
                return;
            }
            state.revision = event.revision;
        }
        self.refresh(
            event.integration.clone(),
            Arc::clone(&event.nested),
            &event.edit,
        );
    }
}
