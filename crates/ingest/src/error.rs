//! Error types produced by the ingest crate.
//!
//! Two kinds of failure exist in this crate and they travel differently:
//!
//! - **Rule violations** inside a record (bad `id`, oversized `text`, wrong
//!   embeddings length) are *data*. They are collected into
//!   [`ValidationError`](crate::ValidationError) values and never show up here.
//! - Everything that means the input or configuration cannot be processed
//!   at all is an [`IngestError`] and aborts the operation.
//!
//! # Error Categories
//!
//! | Error | Category | Description |
//! |-------|----------|-------------|
//! | [`Io`](IngestError::Io) | Structural | File could not be opened or read |
//! | [`MalformedJson`](IngestError::MalformedJson) | Structural | A JSONL line is not valid JSON |
//! | [`NotAnObject`](IngestError::NotAnObject) | Structural | A JSONL line is valid JSON but not an object |
//! | [`Tokenizer`](IngestError::Tokenizer) | Structural | Token counting failed |
//! | [`UnknownModel`](IngestError::UnknownModel) | Configuration | No tokenizer registered for the model |
//! | [`Config`](IngestError::Config) | Configuration | Inconsistent runtime configuration |
//! | [`InvalidBatchSize`](IngestError::InvalidBatchSize) | Configuration | Batch size of zero |
//! | [`InvalidMetadataItem`](IngestError::InvalidMetadataItem) | Model | Metadata item rejected at construction |
//! | [`EmptyDocuments`](IngestError::EmptyDocuments) | Compatibility | Nothing to upload |
//! | [`EmbeddingModeMismatch`](IngestError::EmbeddingModeMismatch) | Compatibility | Document variant disagrees with collection |
//! | [`EmbeddingsDimensionMismatch`](IngestError::EmbeddingsDimensionMismatch) | Compatibility | Vector length disagrees with collection |
//! | [`EmptyUploadFile`](IngestError::EmptyUploadFile) | Compatibility | Upload file has zero bytes |
//! | [`Serialization`](IngestError::Serialization) | Model | Upload record could not be encoded |
//! | [`Transport`](IngestError::Transport) | Transport | Propagated from the upload collaborator |
//!
//! ```rust
//! use ingest::{IngestError, TransportError};
//!
//! let err = IngestError::MalformedJson { line_number: 4, message: "EOF".into() };
//! assert!(err.is_structural());
//!
//! let err: IngestError = TransportError::NotFound("collection books".into()).into();
//! assert!(!err.is_client_error());
//! ```
use thiserror::Error;

use crate::collection::EmbeddingMode;
use crate::config::ConfigError;

/// Errors that abort an ingest operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IngestError {
    /// The JSONL source could not be opened or read.
    #[error("io error: {0}")]
    Io(String),

    /// A line could not be parsed as JSON. Aborts the whole validation run.
    #[error("malformed json on line {line_number}: {message}")]
    MalformedJson {
        /// Zero-based line number of the offending line.
        line_number: usize,
        /// Parser diagnostic.
        message: String,
    },

    /// A line parsed as JSON but is not an object.
    #[error("line {line_number} is not a json object")]
    NotAnObject {
        /// Zero-based line number of the offending line.
        line_number: usize,
    },

    /// The tokenizer failed to encode text.
    #[error("tokenizer failure: {0}")]
    Tokenizer(String),

    /// No tokenizer is registered for the requested model and no fallback is set.
    #[error("no tokenizer registered for model {0:?}")]
    UnknownModel(String),

    /// Runtime configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Batches must hold at least one line.
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    /// A metadata item was rejected at construction time.
    #[error("invalid metadata item: {0}")]
    InvalidMetadataItem(String),

    /// The facade was asked to upload an empty document list.
    #[error("no documents to upload")]
    EmptyDocuments,

    /// A document's embedding mode disagrees with the target collection.
    #[error(
        "document at index {index} is {found} but collection {collection_id} expects {expected}"
    )]
    EmbeddingModeMismatch {
        /// Target collection.
        collection_id: String,
        /// Position of the first offending document.
        index: usize,
        /// Mode declared by the collection.
        expected: EmbeddingMode,
        /// Mode of the offending document.
        found: EmbeddingMode,
    },

    /// A user-provided embeddings vector has the wrong length for the collection.
    #[error(
        "document at index {index} has {actual} embedding dimensions, collection {collection_id} expects {expected}"
    )]
    EmbeddingsDimensionMismatch {
        /// Target collection.
        collection_id: String,
        /// Position of the first offending document.
        index: usize,
        /// Dimension declared by the collection.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// An upload file has no content.
    #[error("upload file {0} is empty")]
    EmptyUploadFile(String),

    /// An upload record could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The upload transport rejected or failed the request.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl IngestError {
    /// True for failures caused by the input or the caller's configuration.
    ///
    /// Transport failures are the only errors that originate elsewhere.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::Transport(_))
    }

    /// True for structural failures that abort a validation run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            IngestError::Io(_)
                | IngestError::MalformedJson { .. }
                | IngestError::NotAnObject { .. }
                | IngestError::Tokenizer(_)
        )
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Serialization(err.to_string())
    }
}

/// Failures reported by the external upload transport.
///
/// The engine never retries these; they are propagated as
/// [`IngestError::Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The service answered with a non-success status.
    #[error("upload rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code returned by the service.
        status: u16,
        /// Body or reason supplied with the rejection.
        message: String,
    },

    /// The collection or account does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The uploaded byte count differs from the size announced for the upload URL.
    #[error("wrong file size: expected {expected} bytes, got {actual}")]
    WrongFileSize {
        /// Size announced when the upload URL was requested.
        expected: u64,
        /// Size actually sent.
        actual: u64,
    },

    /// The request never completed.
    #[error("network failure: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_names_the_line() {
        let err = IngestError::MalformedJson {
            line_number: 7,
            message: "expected value".into(),
        };
        assert!(err.to_string().contains("line 7"));
        assert!(err.is_structural());
        assert!(err.is_client_error());
    }

    #[test]
    fn transport_errors_wrap_and_classify() {
        let err: IngestError = TransportError::Rejected {
            status: 413,
            message: "too large".into(),
        }
        .into();
        assert!(matches!(
            err,
            IngestError::Transport(TransportError::Rejected { status: 413, .. })
        ));
        assert!(!err.is_client_error());
        assert!(!err.is_structural());
    }

    #[test]
    fn io_errors_convert() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: IngestError = io_err.into();
        assert!(matches!(err, IngestError::Io(msg) if msg.contains("no such file")));
    }

    #[test]
    fn mode_mismatch_message_mentions_both_modes() {
        let err = IngestError::EmbeddingModeMismatch {
            collection_id: "books".into(),
            index: 0,
            expected: EmbeddingMode::UserProvided,
            found: EmbeddingMode::VantageManaged,
        };
        let msg = err.to_string();
        assert!(msg.contains("user-provided embeddings"));
        assert!(msg.contains("vantage-managed embeddings"));
    }

    #[test]
    fn wrong_file_size_reports_both_sizes() {
        let err = TransportError::WrongFileSize {
            expected: 10,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "wrong file size: expected 10 bytes, got 12"
        );
    }
}
