//! Typed documents and their upload records.
//!
//! Unlike raw JSONL records, typed [`Document`]s are built in code. They
//! always have an `id` (a fresh UUIDv4 when none is given) and their
//! metadata keys are prefixed once, at construction:
//!
//! | Value | Stored key |
//! |-------|------------|
//! | float | `meta_ordered_<key>` (sortable) |
//! | anything else | `meta_<key>` |
//!
//! ```rust
//! use ingest::{Document, MetadataItem};
//!
//! let doc = Document::new("A brief history of time")
//!     .with_id("book-1")
//!     .with_metadata(MetadataItem::new("author", "Hawking").unwrap())
//!     .with_metadata(MetadataItem::new("rating", 4.5).unwrap());
//!
//! let record = doc.to_upload_record();
//! let keys: Vec<&str> = record.keys().map(String::as_str).collect();
//! assert_eq!(keys, ["id", "text", "meta_author", "meta_ordered_rating"]);
//! ```
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::collection::EmbeddingMode;
use crate::error::IngestError;
use crate::fields::validate_metadata_entry;

const META_KEY_PREFIX: &str = "meta_";
const META_ORDERED_KEY_PREFIX: &str = "meta_ordered_";

/// A metadata value: a scalar or a homogeneous list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<MetadataValue>),
}

impl MetadataValue {
    pub fn is_float(&self) -> bool {
        matches!(self, MetadataValue::Float(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            MetadataValue::Integer(v) => Value::from(*v),
            MetadataValue::Float(v) => Value::from(*v),
            MetadataValue::Text(v) => Value::from(v.as_str()),
            MetadataValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    fn has_non_finite(&self) -> bool {
        match self {
            MetadataValue::Float(v) => !v.is_finite(),
            MetadataValue::List(items) => items.iter().any(Self::has_non_finite),
            _ => false,
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        MetadataValue::Integer(v.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(v: Vec<T>) -> Self {
        MetadataValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// One metadata entry with its key already carrying the `meta_` prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataItem {
    key: String,
    value: MetadataValue,
}

impl MetadataItem {
    /// Builds an item, prefixing `key` with `meta_ordered_` for floats and `meta_` otherwise.
    ///
    /// Fails when the key has characters outside `[A-Za-z0-9_-]`, the value
    /// is an empty or mixed list, or a float is not finite.
    pub fn new(key: impl AsRef<str>, value: impl Into<MetadataValue>) -> Result<Self, IngestError> {
        let value = value.into();
        if key.as_ref().is_empty() {
            return Err(IngestError::InvalidMetadataItem(
                "metadata key must not be empty".into(),
            ));
        }
        let prefix = if value.is_float() {
            META_ORDERED_KEY_PREFIX
        } else {
            META_KEY_PREFIX
        };
        let key = format!("{prefix}{}", key.as_ref());

        if value.has_non_finite() {
            return Err(IngestError::InvalidMetadataItem(format!(
                "{key} must not contain NaN or infinite values"
            )));
        }
        if let Some(err) = validate_metadata_entry(&key, &value.to_json()) {
            return Err(IngestError::InvalidMetadataItem(err.error_message));
        }
        Ok(Self { key, value })
    }

    /// Builds a sortable item. The value must be a float.
    pub fn sortable(key: impl AsRef<str>, value: impl Into<MetadataValue>) -> Result<Self, IngestError> {
        let value = value.into();
        if !value.is_float() {
            return Err(IngestError::InvalidMetadataItem(format!(
                "sortable metadata {} must be a float",
                key.as_ref()
            )));
        }
        Self::new(key, value)
    }

    /// The stored, prefixed key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The key as given by the caller, without its prefix.
    pub fn name(&self) -> &str {
        self.key
            .strip_prefix(META_ORDERED_KEY_PREFIX)
            .or_else(|| self.key.strip_prefix(META_KEY_PREFIX))
            .unwrap_or(&self.key)
    }

    pub fn value(&self) -> &MetadataValue {
        &self.value
    }

    pub fn is_sortable(&self) -> bool {
        self.key.starts_with(META_ORDERED_KEY_PREFIX)
    }
}

/// Fields every document variant shares.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentBase {
    pub id: String,
    pub text: String,
    pub metadata: Vec<MetadataItem>,
}

impl DocumentBase {
    /// A base with a fresh random id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            metadata: Vec::new(),
        }
    }
}

/// A document ready for upload, in one of the two embedding modes.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// Embeddings are computed by the service from `text`.
    VantageManaged(DocumentBase),
    /// The caller supplies the vector.
    UserProvidedEmbeddings {
        base: DocumentBase,
        embeddings: Vec<f64>,
    },
}

impl Document {
    /// A vantage-managed-embeddings document with a fresh id.
    pub fn new(text: impl Into<String>) -> Self {
        Document::VantageManaged(DocumentBase::new(text))
    }

    /// A user-provided-embeddings document with a fresh id.
    pub fn with_embeddings(text: impl Into<String>, embeddings: Vec<f64>) -> Self {
        Document::UserProvidedEmbeddings {
            base: DocumentBase::new(text),
            embeddings,
        }
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.base_mut().id = id.into();
        self
    }

    /// Appends a metadata item.
    pub fn with_metadata(mut self, item: MetadataItem) -> Self {
        self.base_mut().metadata.push(item);
        self
    }

    pub fn base(&self) -> &DocumentBase {
        match self {
            Document::VantageManaged(base) => base,
            Document::UserProvidedEmbeddings { base, .. } => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut DocumentBase {
        match self {
            Document::VantageManaged(base) => base,
            Document::UserProvidedEmbeddings { base, .. } => base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn text(&self) -> &str {
        &self.base().text
    }

    pub fn metadata(&self) -> &[MetadataItem] {
        &self.base().metadata
    }

    pub fn embeddings(&self) -> Option<&[f64]> {
        match self {
            Document::VantageManaged(_) => None,
            Document::UserProvidedEmbeddings { embeddings, .. } => Some(embeddings),
        }
    }

    pub fn embedding_mode(&self) -> EmbeddingMode {
        match self {
            Document::VantageManaged(_) => EmbeddingMode::VantageManaged,
            Document::UserProvidedEmbeddings { .. } => EmbeddingMode::UserProvided,
        }
    }

    /// The flat upload record: `id`, `text`, `embeddings` (UPE only), then metadata in insertion order.
    pub fn to_upload_record(&self) -> Map<String, Value> {
        let base = self.base();
        let mut record = Map::new();
        record.insert("id".into(), Value::from(base.id.as_str()));
        record.insert("text".into(), Value::from(base.text.as_str()));
        if let Some(embeddings) = self.embeddings() {
            record.insert(
                "embeddings".into(),
                Value::Array(embeddings.iter().map(|v| Value::from(*v)).collect()),
            );
        }
        for item in &base.metadata {
            record.insert(item.key.clone(), item.value.to_json());
        }
        record
    }

    /// The upload record as one JSONL line, without terminator.
    pub fn to_jsonl_line(&self) -> Result<String, IngestError> {
        Ok(serde_json::to_string(&self.to_upload_record())?)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_upload_record().serialize(serializer)
    }
}

/// Joins the upload records of `documents` into a newline-separated JSONL body.
pub fn to_jsonl_body(documents: &[Document]) -> Result<String, IngestError> {
    let lines = documents
        .iter()
        .map(Document::to_jsonl_line)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}
