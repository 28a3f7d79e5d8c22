//! Linear snapshot history
//!
//! [`History`] keeps past and future snapshots for undo/redo. Whether a new
//! snapshot is worth recording is decided by a pluggable
//! [`SnapshotEquality`] predicate: a commit equal to the current snapshot
//! is not pushed.

use std::fmt::Debug;
use stepflow_model::{DocumentFingerprint, Integration};

/// Equality predicate for history compaction
pub trait SnapshotEquality: Send + Sync + Debug {
    /// Whether two snapshots are logically the same state
    fn equal(&self, a: &Integration, b: &Integration) -> bool;

    /// Predicate name (for logging)
    fn name(&self) -> &'static str;
}

/// Structural equality
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepEquality;

impl SnapshotEquality for DeepEquality {
    fn equal(&self, a: &Integration, b: &Integration) -> bool {
        a == b
    }

    fn name(&self) -> &'static str {
        "deep"
    }
}

/// Blake3 fingerprint equality over the JSON encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintEquality;

impl SnapshotEquality for FingerprintEquality {
    fn equal(&self, a: &Integration, b: &Integration) -> bool {
        match (DocumentFingerprint::of(a), DocumentFingerprint::of(b)) {
            (Ok(a), Ok(b)) => a == b,
            // unencodable snapshots are never merged
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        "fingerprint"
    }
}

/// Past and future snapshots around the current one
#[derive(Debug, Clone)]
pub struct History<T> {
    past: Vec<T>,
    future: Vec<T>,
    limit: Option<usize>,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T> History<T> {
    /// Create with optional depth limit
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            limit,
        }
    }

    /// Record the snapshot being replaced; clears the redo stack
    pub fn record(&mut self, previous: T) {
        self.past.push(previous);
        self.future.clear();
        if let Some(limit) = self.limit {
            let excess = self.past.len().saturating_sub(limit);
            self.past.drain(..excess);
        }
    }

    /// Step back, returning the snapshot to restore
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.past.pop()?;
        self.future.push(current);
        Some(previous)
    }

    /// Step forward, returning the snapshot to restore
    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.future.pop()?;
        self.past.push(current);
        Some(next)
    }

    /// Whether undo is possible
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Whether redo is possible
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of undoable snapshots
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.past.len()
    }

    /// Drop all snapshots
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
