//! Error types for graph and editor operations

use stepflow_store::{ConfigError, StoreError};

/// Selection could not be resolved
///
/// Never surfaced to the user: the viewport clears the selection instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// UUID no longer names a step of the current document
    #[error("selected step '{0}' no longer exists")]
    Stale(String),
}

/// Errors from editor gestures
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Underlying store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Gesture referenced a node that is not in the current graph
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Drop landed on something that does not accept steps
    #[error("'{0}' is not a drop target")]
    NotADropTarget(String),

    /// Editor configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
