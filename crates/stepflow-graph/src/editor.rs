//! Editor session
//!
//! [`FlowEditor`] wires a [`DocumentStore`] to a [`ViewportStore`] and turns
//! canvas gestures into store operations. Stores are owned by the session
//! and handed out as `Arc`s; there is no global state.

use crate::derive::VisualizationService;
use crate::error::EditorError;
use crate::types::{EdgeChange, LayoutMode, NodeChange, NodeKind};
use crate::viewport::ViewportStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use stepflow_model::{Integration, Step};
use stepflow_store::{
    CommitEvent, CommitObserver, ConfigError, DocumentStore, IntegrationStore, StepsService,
    StoreConfig, ViewProvider,
};
use tracing::debug;

/// Initial canvas settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Flow direction
    pub layout: LayoutMode,
    /// Wrap each flow in a group node
    pub multiple_flows: bool,
}

impl GraphSettings {
    /// Derivation service for these settings
    #[inline]
    #[must_use]
    pub const fn service(&self) -> VisualizationService {
        VisualizationService::new(self.layout, self.multiple_flows)
    }
}

/// Full editor configuration
///
/// ```toml
/// [store]
/// dsl = "KameletBinding"
/// history_limit = 50
///
/// [graph]
/// layout = "vertical"
/// multiple_flows = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub store: StoreConfig,
    pub graph: GraphSettings,
}

impl EditorConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns error on invalid TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&text)
    }
}

/// Refreshes views after each commit
struct ViewRefresher {
    store: std::sync::Weak<DocumentStore>,
    provider: Arc<dyn ViewProvider>,
}

impl CommitObserver for ViewRefresher {
    fn on_commit(&self, event: &CommitEvent) {
        if let Some(store) = self.store.upgrade() {
            store.update_views(self.provider.views_for(&event.integration.steps));
        }
    }
}

/// One editing session over one document
#[derive(Debug)]
pub struct FlowEditor {
    store: Arc<DocumentStore>,
    viewport: Arc<ViewportStore>,
    steps: StepsService<DocumentStore>,
}

impl FlowEditor {
    /// Session over the configured initial document
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self::from_store(Arc::new(DocumentStore::with_config(config.store)), config.graph)
    }

    /// Session over an existing document
    #[must_use]
    pub fn with_document(config: EditorConfig, integration: Integration) -> Self {
        Self::from_store(
            Arc::new(DocumentStore::with_document(config.store, integration)),
            config.graph,
        )
    }

    fn from_store(store: Arc<DocumentStore>, graph: GraphSettings) -> Self {
        let viewport = Arc::new(ViewportStore::new(
            graph.service(),
            store.integration(),
            store.nested_steps(),
        ));
        store.subscribe(viewport.clone());
        Self {
            steps: StepsService::new(Arc::clone(&store)),
            store,
            viewport,
        }
    }

    /// Refresh views from `provider` now and after every commit
    #[must_use]
    pub fn with_view_provider(self, provider: Arc<dyn ViewProvider>) -> Self {
        self.steps.refresh_views(provider.as_ref());
        self.store.subscribe(Arc::new(ViewRefresher {
            store: Arc::downgrade(&self.store),
            provider,
        }));
        self
    }

    /// The document store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// The viewport
    #[inline]
    #[must_use]
    pub fn viewport(&self) -> &Arc<ViewportStore> {
        &self.viewport
    }

    /// Step-level operations
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &StepsService<DocumentStore> {
        &self.steps
    }

    /// Node click: select the step and toggle the detail panel
    ///
    /// Placeholders ignore clicks. Clicking the already selected step while
    /// the panel is open closes it.
    ///
    /// # Errors
    /// Returns [`EditorError::NodeNotFound`] for an unknown node id
    pub fn on_node_click(&self, node_id: &str) -> Result<(), EditorError> {
        let graph = self.viewport.graph();
        let node = graph
            .node(node_id)
            .ok_or_else(|| EditorError::NodeNotFound(node_id.to_string()))?;
        let Some(uuid) = node.step_uuid() else {
            return Ok(());
        };

        let was_expanded = self.viewport.is_panel_expanded();
        let previous = self.viewport.selected_uuid();
        if self.viewport.select(uuid).is_err() {
            return Ok(());
        }

        if !was_expanded {
            self.viewport.set_panel_expanded(true);
        } else if previous.as_deref() == Some(uuid) {
            self.viewport.close_panel();
        }
        Ok(())
    }

    /// Delete button on a step node
    ///
    /// # Errors
    /// Returns error if the step does not exist
    pub fn on_delete_click(&self, uuid: &str) -> Result<(), EditorError> {
        if self.viewport.selected_uuid().as_deref() == Some(uuid) {
            self.viewport.clear_selection();
        }
        self.steps.delete_step_by_uuid(uuid)?;
        Ok(())
    }

    /// Delete button on a branch edge
    ///
    /// # Errors
    /// Returns error if the edge is not a delete edge or the branch cannot
    /// be removed
    pub fn on_delete_branch_click(&self, edge_id: &str) -> Result<(), EditorError> {
        let graph = self.viewport.graph();
        let edge = graph
            .edge(edge_id)
            .ok_or_else(|| EditorError::NodeNotFound(edge_id.to_string()))?;
        let target = edge
            .branch
            .as_ref()
            .ok_or_else(|| EditorError::NotADropTarget(edge_id.to_string()))?;
        self.steps
            .delete_branch(&target.parent_uuid, target.branch_index)?;
        Ok(())
    }

    /// Drop a catalog template on a placeholder node or insert edge
    ///
    /// # Errors
    /// Returns [`EditorError::NotADropTarget`] if the target accepts no
    /// steps, or a store error if the insertion fails
    pub fn on_drop(&self, target_id: &str, step: Step) -> Result<(), EditorError> {
        let graph = self.viewport.graph();
        let locus = if let Some(node) = graph.node(target_id) {
            match (node.kind, &node.locus) {
                (NodeKind::Placeholder, Some(locus)) => locus.clone(),
                _ => return Err(EditorError::NotADropTarget(target_id.to_string())),
            }
        } else if let Some(edge) = graph.edge(target_id) {
            edge.locus
                .clone()
                .ok_or_else(|| EditorError::NotADropTarget(target_id.to_string()))?
        } else {
            return Err(EditorError::NodeNotFound(target_id.to_string()));
        };
        debug!(target = target_id, step = %step.name, "drop");
        self.steps.insert_at(&locus, step)?;
        Ok(())
    }

    /// Detail panel "save": merge parameters into the selected step
    ///
    /// # Errors
    /// Returns error if the step no longer exists
    pub fn save_config(&self, uuid: &str, values: BTreeMap<String, Value>) -> Result<(), EditorError> {
        self.steps.update_step_parameters(uuid, values)?;
        Ok(())
    }

    /// Close the detail panel
    pub fn close_panel(&self) {
        self.viewport.close_panel();
    }

    /// Canvas node changes
    pub fn on_nodes_change(&self, changes: Vec<NodeChange>) {
        self.viewport.apply_node_changes(changes);
    }

    /// Canvas edge changes
    pub fn on_edges_change(&self, changes: Vec<EdgeChange>) {
        self.viewport.apply_edge_changes(changes);
    }

    /// Switch layout
    pub fn set_layout(&self, layout: LayoutMode) {
        self.viewport.set_layout(layout);
    }

    /// Toggle flow grouping
    pub fn set_multiple_flows(&self, multiple_flows: bool) {
        self.viewport.set_multiple_flows(multiple_flows);
    }
}

impl std::fmt::Debug for ViewRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRefresher").finish_non_exhaustive()
    }
}
