//! Store configuration
//!
//! Loaded from TOML; every field has a default.
//!
//! ```toml
//! dsl = "KameletBinding"
//! name = "integration"
//! namespace = "default"
//! history_limit = 100
//! equality = "fingerprint"
//! ```

use crate::error::ConfigError;
use crate::history::{DeepEquality, FingerprintEquality, SnapshotEquality};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stepflow_model::Integration;

/// How consecutive snapshots are compared before recording history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualityMode {
    /// Structural comparison
    #[default]
    Deep,
    /// Blake3 fingerprint comparison
    Fingerprint,
}

/// Document store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Flow dialect of the initial document
    pub dsl: String,

    /// Metadata name of the initial document
    pub name: String,

    /// Metadata namespace of the initial document
    pub namespace: String,

    /// Maximum undo depth (`None` = unlimited)
    pub history_limit: Option<usize>,

    /// Snapshot comparison mode
    pub equality: EqualityMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dsl: "KameletBinding".to_string(),
            name: "integration".to_string(),
            namespace: "default".to_string(),
            history_limit: None,
            equality: EqualityMode::Deep,
        }
    }
}

impl StoreConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns error on invalid TOML or unknown enum values
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

    /// Set history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Set equality mode
    #[inline]
    #[must_use]
    pub fn with_equality(mut self, equality: EqualityMode) -> Self {
        self.equality = equality;
        self
    }

    /// The document a fresh or reset store starts from
    #[must_use]
    pub fn initial_document(&self) -> Integration {
        Integration::empty(&self.dsl, &self.name, &self.namespace)
    }

    /// Equality predicate for the configured mode
    #[must_use]
    pub fn equality_predicate(&self) -> Box<dyn SnapshotEquality> {
        match self.equality {
            EqualityMode::Deep => Box::new(DeepEquality),
            EqualityMode::Fingerprint => Box::new(FingerprintEquality),
        }
    }
}
