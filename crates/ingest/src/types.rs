//! Validation result types.
//!
//! A validation run yields one [`ValidationError`] per invalid record, each
//! holding the [`FieldError`]s found on that record in field order
//! (`id`, `operation`, `text`, metadata, `embeddings`).
//!
//! ```rust
//! use ingest::{FieldError, ValidationError};
//!
//! let err = ValidationError {
//!     document_id: Some("doc-1".into()),
//!     line_number: Some(3),
//!     errors: vec![FieldError::new("text", "Missing required field 'text'")],
//! };
//! assert!(err.has_field("text"));
//! assert_eq!(err.to_string(), "line 3 (id doc-1): text: Missing required field 'text'");
//! ```
use std::fmt;

use serde::{Deserialize, Serialize};

/// One rule violation on one field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Record key the violation belongs to (`id`, `text`, `meta_color`, ...).
    pub field_name: String,
    /// Human-readable description of the violation.
    pub error_message: String,
}

impl FieldError {
    pub fn new(field_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            error_message: error_message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_name, self.error_message)
    }
}

/// All violations found on one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The record's `id`, when it had a string one.
    pub document_id: Option<String>,
    /// Zero-based line number of the record in its JSONL source.
    pub line_number: Option<usize>,
    /// Violations in field order. Never empty.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// True when any violation is attached to `field_name`.
    pub fn has_field(&self, field_name: &str) -> bool {
        self.errors.iter().any(|e| e.field_name == field_name)
    }

    /// Field names in the order they were reported.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.field_name.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "line {line}")?,
            None => write!(f, "record")?,
        }
        if let Some(id) = &self.document_id {
            write!(f, " (id {id})")?;
        }
        write!(f, ":")?;
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                write!(f, ";")?;
            }
            write!(f, " {err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_field_errors() {
        let err = ValidationError {
            document_id: None,
            line_number: Some(0),
            errors: vec![
                FieldError::new("id", "Missing required field 'id'"),
                FieldError::new("embeddings", "bad"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "line 0: id: Missing required field 'id'; embeddings: bad"
        );
        assert_eq!(err.field_names().collect::<Vec<_>>(), ["id", "embeddings"]);
    }

    #[test]
    fn serializes_as_flat_json() {
        let err = ValidationError {
            document_id: Some("a".into()),
            line_number: Some(2),
            errors: vec![FieldError::new("text", "too long")],
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "document_id": "a",
                "line_number": 2,
                "errors": [{"field_name": "text", "error_message": "too long"}]
            })
        );
    }
}
