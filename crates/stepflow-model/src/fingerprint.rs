//! Content fingerprints of integration documents
//!
//! [`DocumentFingerprint`] is a Blake3 hash over the canonical JSON encoding
//! of a value. Two documents with equal fingerprints are treated as equal by
//! the fingerprint history mode.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// 32-byte Blake3 fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentFingerprint([u8; 32]);

impl DocumentFingerprint {
    /// Fingerprint of raw bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Fingerprint of a serializable value (JSON encoding)
    ///
    /// Map keys of typed structs serialize in declaration order and step
    /// parameters are ordered maps, so the encoding is stable.
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(value)?;
        Ok(Self::compute(&json))
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex characters
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for DocumentFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::Integration;
    use crate::step::{Step, StepKind};

    #[test]
    fn fingerprint_deterministic() {
        let a = DocumentFingerprint::compute(b"steps");
        let b = DocumentFingerprint::compute(b"steps");
        assert_eq!(a, b);
        assert_eq!(a.to_string().len(), 64);
        assert_eq!(a.short().len(), 16);
    }

    #[test]
    fn fingerprint_tracks_document_content() {
        let mut doc = Integration::empty("KameletBinding", "integration", "default");
        let before = DocumentFingerprint::of(&doc).unwrap();
        assert_eq!(before, DocumentFingerprint::of(&doc.clone()).unwrap());

        doc.steps.push_back(Step::new("log", StepKind::Middle));
        assert_ne!(before, DocumentFingerprint::of(&doc).unwrap());
    }
}
