//! Text representations of integration documents
//!
//! Documents arrive from the text editor as YAML or JSON. Both decode into a
//! loosely-typed [`serde_json::Value`] first so that the store can merge them
//! over the current document before committing.

use crate::integration::Integration;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Text format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceFormat {
    /// YAML (the editor default)
    #[default]
    Yaml,
    /// JSON
    Json,
}

impl SourceFormat {
    /// Guess the format from the first significant character
    #[must_use]
    pub fn detect(text: &str) -> Self {
        match text.trim_start().chars().next() {
            Some('{' | '[') => Self::Json,
            _ => Self::Yaml,
        }
    }

    /// Format for a file extension (`yaml`, `yml`, `json`)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl Display for SourceFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        })
    }
}

/// Decode text into a loosely-typed document
///
/// # Errors
/// Returns a decode error if the text is not valid in `format`
pub fn parse_value(text: &str, format: SourceFormat) -> Result<Value, DocumentError> {
    Ok(match format {
        SourceFormat::Yaml => serde_yaml::from_str(text)?,
        SourceFormat::Json => serde_json::from_str(text)?,
    })
}

/// Decode a complete integration, detecting the format
///
/// # Errors
/// Returns [`DocumentError::Malformed`] if the document has no `steps`
/// sequence, or a decode error for invalid text.
pub fn parse_integration(text: &str) -> Result<Integration, DocumentError> {
    let value = parse_value(text, SourceFormat::detect(text))?;
    require_steps(&value)?;
    Ok(serde_json::from_value(value)?)
}

/// Render an integration back to text
///
/// # Errors
/// Returns an encode error if serialization fails
pub fn render(integration: &Integration, format: SourceFormat) -> Result<String, DocumentError> {
    Ok(match format {
        SourceFormat::Yaml => serde_yaml::to_string(integration)?,
        SourceFormat::Json => serde_json::to_string_pretty(integration)?,
    })
}

/// Check that `value` is a mapping holding a `steps` sequence
pub(crate) fn require_steps(value: &Value) -> Result<(), DocumentError> {
    let Value::Object(map) = value else {
        return Err(DocumentError::malformed("document is not a mapping"));
    };
    match map.get("steps") {
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(DocumentError::malformed("`steps` is not a sequence")),
        None => Err(DocumentError::malformed("document has no `steps` sequence")),
    }
}

/// Errors decoding or validating a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Structurally unusable document
    #[error("malformed document: {0}")]
    Malformed(String),

    /// YAML decode/encode failure
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON decode/encode failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocumentError {
    /// Create a malformed-document error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;

    const YAML: &str = r"
id: KameletBinding-1
dsl: KameletBinding
metadata:
  name: orders
  namespace: default
steps:
  - name: kafka-source
    type: START
  - name: log
    type: MIDDLE
";

    #[test]
    fn detect_format() {
        assert_eq!(SourceFormat::detect("  {\"steps\": []}"), SourceFormat::Json);
        assert_eq!(SourceFormat::detect("steps: []"), SourceFormat::Yaml);
        assert_eq!(SourceFormat::detect(""), SourceFormat::Yaml);
        assert_eq!(SourceFormat::from_extension("YML"), Some(SourceFormat::Yaml));
        assert_eq!(SourceFormat::from_extension("txt"), None);
    }

    #[test]
    fn parse_yaml_integration() {
        let doc = parse_integration(YAML).unwrap();
        assert_eq!(doc.metadata.name, "orders");
        assert_eq!(doc.steps.len(), 2);
        assert_eq!(doc.steps[0].kind, StepKind::Start);
    }

    #[test]
    fn render_round_trips() {
        let doc = parse_integration(YAML).unwrap();
        for format in [SourceFormat::Yaml, SourceFormat::Json] {
            let text = render(&doc, format).unwrap();
            assert_eq!(parse_integration(&text).unwrap(), doc);
        }
    }

    #[test]
    fn reject_document_without_steps() {
        let err = parse_integration("metadata:\n  name: x\n").unwrap_err();
        assert!(matches!(err, DocumentError::Malformed(_)));

        let err = parse_integration("{\"steps\": 3}").unwrap_err();
        assert!(matches!(err, DocumentError::Malformed(_)));
    }

    #[test]
    fn reject_invalid_text() {
        assert!(matches!(
            parse_value("{not json", SourceFormat::Json),
            Err(DocumentError::Json(_))
        ));
        assert!(matches!(
            parse_value("steps: [", SourceFormat::Yaml),
            Err(DocumentError::Yaml(_))
        ));
    }
}
