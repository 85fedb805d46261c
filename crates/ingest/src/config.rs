//! Configuration types for validation and batching.
//!
//! [`ValidationConfig`] carries everything the field validators need to know
//! about the target collection (model name, embedding mode, dimension) plus
//! the record limits. [`BatchConfig`] bounds upload batches. Both are passed
//! explicitly into every entry point; nothing is read from the environment.
//!
//! ```rust
//! use ingest::ValidationConfig;
//!
//! let cfg = ValidationConfig::user_provided("text-embedding-ada-002", 1536);
//! cfg.validate().expect("valid configuration");
//! assert_eq!(cfg.max_text_tokens, 8191);
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token limit enforced on `text` by default.
pub const DEFAULT_MAX_TEXT_TOKENS: usize = 8191;

/// Character limit enforced on `id` by default.
pub const DEFAULT_MAX_ID_CHARS: usize = 256;

/// Lines per upload batch by default.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Model whose tokenizer is used when none is configured.
pub const DEFAULT_MODEL: &str = "text-embedding-ada-002";

/// Runtime configuration for document validation.
///
/// # Serialization
///
/// ```json
/// {
///   "model": "text-embedding-ada-002",
///   "user_provided_embeddings": true,
///   "embeddings_dimension": 1536,
///   "max_text_tokens": 8191,
///   "max_id_chars": 256,
///   "reject_duplicate_ids": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Model name used to select the tokenizer for `text` length checks.
    pub model: String,

    /// Whether the target collection takes user-provided embeddings (UPE).
    ///
    /// UPE records must carry `embeddings`; `text` becomes optional.
    pub user_provided_embeddings: bool,

    /// Declared embeddings dimension of a UPE collection.
    pub embeddings_dimension: Option<usize>,

    /// Maximum token count for `text`.
    ///
    /// Default: `8191`
    pub max_text_tokens: usize,

    /// Maximum character count for `id`.
    ///
    /// Default: `256`
    pub max_id_chars: usize,

    /// Report a repeated `id` as an error on every later line that uses it.
    ///
    /// The duplicate error is listed first among that record's field errors,
    /// ahead of the per-field rule violations. It is not added when the record
    /// already has an `id` error.
    ///
    /// Default: `false`
    pub reject_duplicate_ids: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            user_provided_embeddings: false,
            embeddings_dimension: None,
            max_text_tokens: DEFAULT_MAX_TEXT_TOKENS,
            max_id_chars: DEFAULT_MAX_ID_CHARS,
            reject_duplicate_ids: false,
        }
    }
}

impl ValidationConfig {
    /// Configuration for a collection with vantage-managed embeddings.
    pub fn vantage_managed(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Configuration for a user-provided-embeddings collection of the given dimension.
    pub fn user_provided(model: impl Into<String>, embeddings_dimension: usize) -> Self {
        Self {
            model: model.into(),
            user_provided_embeddings: true,
            embeddings_dimension: Some(embeddings_dimension),
            ..Default::default()
        }
    }

    /// Checks internal consistency. Call once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if self.max_text_tokens == 0 {
            return Err(ConfigError::ZeroLimit("max_text_tokens"));
        }
        if self.max_id_chars == 0 {
            return Err(ConfigError::ZeroLimit("max_id_chars"));
        }
        if self.user_provided_embeddings {
            match self.embeddings_dimension {
                None => return Err(ConfigError::MissingEmbeddingsDimension),
                Some(0) => return Err(ConfigError::ZeroLimit("embeddings_dimension")),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Bounds applied when cutting JSONL content into upload batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of lines per batch.
    ///
    /// Default: `500`
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchConfig {
    /// Checks internal consistency. Call once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroLimit("batch_size"));
        }
        Ok(())
    }
}

/// Configuration-time inconsistencies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A UPE collection was configured without an embeddings dimension.
    #[error("user_provided_embeddings requires embeddings_dimension")]
    MissingEmbeddingsDimension,

    /// A limit that must be positive was set to zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    /// The model name is blank.
    #[error("model name must not be empty")]
    EmptyModel,
}
