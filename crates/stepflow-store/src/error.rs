//! Error types for the document store

use stepflow_model::{DocumentError, PathError};
use std::path::PathBuf;

/// Errors raised by store operations
///
/// Contract violations (bad path, bad index, unknown branch) leave the
/// current snapshot untouched. With the `strict-contracts` feature they
/// panic instead of returning.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Path addressing failed
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Top-level index past the end of the forest
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Branch does not exist on the given step
    #[error("step '{uuid}' has no branch {branch_index}")]
    BranchNotFound { uuid: String, branch_index: usize },

    /// Removing a branch would violate `minBranches`
    #[error("step '{uuid}' requires at least {min} branches")]
    BranchArity { uuid: String, min: i32 },

    /// Externally supplied document rejected before mutation
    #[error("malformed document: {0}")]
    MalformedDocument(#[from] DocumentError),

    /// No step with this UUID
    #[error("step not found: {0}")]
    StepNotFound(String),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// Whether this indicates a collaborator bug rather than bad user input
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath(_)
                | Self::IndexOutOfRange { .. }
                | Self::BranchNotFound { .. }
                | Self::BranchArity { .. }
        )
    }
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML syntax or schema error
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Route a contract violation through the `strict-contracts` check
pub(crate) fn contract_violation(err: StoreError) -> StoreError {
    if cfg!(feature = "strict-contracts") {
        panic!("store contract violated: {err}");
    }
    tracing::warn!(error = %err, "rejected store operation");
    err
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
