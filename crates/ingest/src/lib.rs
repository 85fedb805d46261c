//! Vantage Ingest Engine
//!
//! This is where documents get checked and cut up before they reach a
//! Vantage collection. Bulk records arrive as JSONL, typed documents are built
//! in code, and both end up as newline-separated upload bodies.
//!
//! ## What we do here
//!
//! - **Validate records** - `id` format, `operation`, `text` length in model
//!   tokens, metadata key and value typing, embeddings length. Violations are
//!   collected per line so a whole file can be fixed in one pass.
//! - **Count tokens** - Through a [`TokenizerRegistry`] that maps a model name
//!   to a [`TokenCounter`] (a `tokenizer.json` with the `hf-tokenizers` feature).
//! - **Batch** - Stream a JSONL source into bounded batches without ever
//!   splitting a line.
//! - **Model documents** - [`Document`] and [`MetadataItem`] prefix metadata
//!   keys and serialize to the upload wire record.
//! - **Upload** - [`Ingestor`] checks documents against the target
//!   collection and hands bodies to an [`UploadTransport`].
//! - **Log everything** - Structured logs via tracing.
//!
//! ## Main entry points
//!
//! [`validate_jsonl`] for a file, [`validate_jsonl_str`] for an in-memory body,
//! [`BatchReader`] / [`split_batches`] for batching and [`Ingestor`] for uploads.
//! Malformed input is an [`IngestError`]; rule violations come back as
//! [`ValidationError`] values.
//!
//! ## Example
//!
//! ```
//! use ingest::{split_batches, validate_jsonl_str, TokenizerRegistry, ValidationConfig};
//!
//! let body = concat!(
//!     r#"{"id": "a", "text": "first", "meta_lang": "en"}"#, "\n",
//!     r#"{"id": "b", "text": "second", "meta_ordered_score": 1}"#, "\n",
//!     r#"{"id": "c", "text": "third"}"#, "\n",
//! );
//! let registry = TokenizerRegistry::with_estimating_fallback();
//! let cfg = ValidationConfig::vantage_managed("text-embedding-ada-002");
//!
//! let errors = validate_jsonl_str(body, &registry, &cfg).unwrap();
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].document_id.as_deref(), Some("b"));
//! assert!(errors[0].has_field("meta_ordered_score"));
//!
//! let batches = split_batches(body, 2).unwrap();
//! assert_eq!(batches.len(), 2);
//! assert_eq!(batches.concat(), body);
//! ```

mod batch;
mod collection;
mod config;
mod document;
mod error;
pub mod fields;
mod tokenizer;
mod types;
mod upload;
mod validator;

pub use crate::batch::{count_lines, read_batch, split_batches, BatchReader};
pub use crate::collection::{
    CollectionDescriptor, CollectionParams, CreateCollection, EmbeddingMode,
};
pub use crate::config::{
    BatchConfig, ConfigError, ValidationConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_ID_CHARS,
    DEFAULT_MAX_TEXT_TOKENS, DEFAULT_MODEL,
};
pub use crate::document::{to_jsonl_body, Document, DocumentBase, MetadataItem, MetadataValue};
pub use crate::error::{IngestError, TransportError};
pub use crate::fields::Record;
#[cfg(feature = "hf-tokenizers")]
pub use crate::tokenizer::HfTokenizer;
pub use crate::tokenizer::{
    EstimatingTokenizer, TokenCounter, TokenizerRegistry, WhitespaceTokenizer,
};
pub use crate::types::{FieldError, ValidationError};
pub use crate::upload::{CollectionLookup, Ingestor, UploadOutcome, UploadTransport};
pub use crate::validator::{parse_record, validate_jsonl, validate_jsonl_str, DocumentValidator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_documents_pass_bulk_validation() {
        let docs = vec![
            Document::with_embeddings("first", vec![0.1, 0.2, 0.3])
                .with_metadata(MetadataItem::new("rank", 0.5).unwrap())
                .with_metadata(MetadataItem::new("tags", vec!["a", "b"]).unwrap()),
            Document::with_embeddings("", vec![1.0, 2.0, 3.0]),
        ];
        let body = to_jsonl_body(&docs).unwrap();

        let registry = TokenizerRegistry::with_estimating_fallback();
        let cfg = ValidationConfig::user_provided(DEFAULT_MODEL, 3);
        let errors = validate_jsonl_str(&body, &registry, &cfg).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn batches_of_a_valid_body_validate_like_the_whole() {
        let body = (0..7)
            .map(|i| format!("{{\"id\": \"d{i}\", \"text\": \"doc {i}\"}}\n"))
            .collect::<String>();
        let registry = TokenizerRegistry::with_estimating_fallback();
        let cfg = ValidationConfig::default();

        let batches = split_batches(&body, 3).unwrap();
        assert_eq!(batches.len(), 3);
        for batch in batches {
            assert!(validate_jsonl_str(batch, &registry, &cfg)
                .unwrap()
                .is_empty());
        }
        assert_eq!(count_lines(&body), 8);
    }
}
