//! Stepflow document store
//!
//! Single-writer store for integration documents with undo/redo history and
//! commit notifications.
//!
//! # Core Concepts
//!
//! - [`IntegrationStore`]: The structural operation set
//! - [`DocumentStore`]: In-memory implementation (snapshot + history)
//! - [`CommitObserver`]: Receives every committed snapshot, in order
//! - [`SnapshotEquality`]: Pluggable history compaction predicate
//! - [`StepsService`]: UUID lookups and gesture-level edits
//!
//! # Strict Mode
//!
//! With the `strict-contracts` feature, contract violations (bad index, bad
//! path, unknown branch) panic instead of returning an error.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod events;
mod history;
mod service;
mod store;

pub use config::{EqualityMode, StoreConfig};
pub use error::{ConfigError, StoreError, StoreResult};
pub use events::{CommitCause, CommitEvent, CommitObserver, Operation, StepEdit};
pub use history::{DeepEquality, FingerprintEquality, History, SnapshotEquality};
pub use service::{InsertLocus, StaticViewCatalog, StepsService, ViewProvider, ViewTemplate};
pub use store::{DocumentStore, IntegrationStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether contract violations panic
pub const fn strict_contracts() -> bool {
    cfg!(feature = "strict-contracts")
}
