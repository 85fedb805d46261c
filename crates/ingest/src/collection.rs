//! Collection-side facts the ingest engine depends on.
//!
//! A collection either computes embeddings from `text` itself
//! ([`EmbeddingMode::VantageManaged`]) or expects the caller to supply them
//! ([`EmbeddingMode::UserProvided`]). [`CollectionDescriptor`] is the resolved
//! view the facade checks documents against; [`CreateCollection`] carries the
//! creation parameters as an explicit tagged union rather than a bag of
//! optional fields.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;

/// Who produces the embedding vectors of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// Vectors are computed server-side from `text`.
    VantageManaged,
    /// Vectors are supplied with every document.
    UserProvided,
}

impl EmbeddingMode {
    pub fn is_user_provided(self) -> bool {
        matches!(self, EmbeddingMode::UserProvided)
    }
}

impl fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingMode::VantageManaged => write!(f, "vantage-managed embeddings"),
            EmbeddingMode::UserProvided => write!(f, "user-provided embeddings"),
        }
    }
}

/// The parts of a collection that validation and upload depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub collection_id: String,
    pub account_id: String,
    pub user_provided_embeddings: bool,
    /// Declared vector length. Only meaningful for UPE collections.
    pub embeddings_dimension: Option<usize>,
}

impl CollectionDescriptor {
    pub fn embedding_mode(&self) -> EmbeddingMode {
        if self.user_provided_embeddings {
            EmbeddingMode::UserProvided
        } else {
            EmbeddingMode::VantageManaged
        }
    }

    /// Validation settings matching this collection, using `model` for token counts.
    pub fn validation_config(&self, model: impl Into<String>) -> ValidationConfig {
        ValidationConfig {
            model: model.into(),
            user_provided_embeddings: self.user_provided_embeddings,
            embeddings_dimension: self.embeddings_dimension,
            ..Default::default()
        }
    }
}

/// Embedding parameters chosen when a collection is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "embeddings", rename_all = "snake_case")]
pub enum CollectionParams {
    /// The service embeds `text` with the named provider and model.
    VantageManaged {
        llm_provider: String,
        llm: String,
        /// Key registered with the service for the provider, if not the account default.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_key_id: Option<String>,
    },
    /// The caller uploads vectors of a fixed dimension.
    UserProvidedEmbeddings { embeddings_dimension: usize },
}

/// A collection creation request.
///
/// ```rust
/// use ingest::{CollectionParams, CreateCollection};
///
/// let request = CreateCollection {
///     collection_id: "books".into(),
///     collection_name: "Books".into(),
///     params: CollectionParams::UserProvidedEmbeddings { embeddings_dimension: 1536 },
/// };
/// let descriptor = request.descriptor("acct-1");
/// assert!(descriptor.user_provided_embeddings);
/// assert_eq!(descriptor.embeddings_dimension, Some(1536));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCollection {
    pub collection_id: String,
    pub collection_name: String,
    #[serde(flatten)]
    pub params: CollectionParams,
}

impl CreateCollection {
    pub fn embedding_mode(&self) -> EmbeddingMode {
        match self.params {
            CollectionParams::VantageManaged { .. } => EmbeddingMode::VantageManaged,
            CollectionParams::UserProvidedEmbeddings { .. } => EmbeddingMode::UserProvided,
        }
    }

    /// The descriptor the created collection will have under `account_id`.
    pub fn descriptor(&self, account_id: impl Into<String>) -> CollectionDescriptor {
        let embeddings_dimension = match self.params {
            CollectionParams::UserProvidedEmbeddings {
                embeddings_dimension,
            } => Some(embeddings_dimension),
            CollectionParams::VantageManaged { .. } => None,
        };
        CollectionDescriptor {
            collection_id: self.collection_id.clone(),
            account_id: account_id.into(),
            user_provided_embeddings: embeddings_dimension.is_some(),
            embeddings_dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn managed_params_resolve_without_dimension() {
        let request = CreateCollection {
            collection_id: "news".into(),
            collection_name: "News".into(),
            params: CollectionParams::VantageManaged {
                llm_provider: "OpenAI".into(),
                llm: "text-embedding-ada-002".into(),
                external_key_id: None,
            },
        };
        let descriptor = request.descriptor("acct");
        assert_eq!(descriptor.embedding_mode(), EmbeddingMode::VantageManaged);
        assert_eq!(descriptor.embeddings_dimension, None);
        assert_eq!(descriptor.account_id, "acct");
    }

    #[test]
    fn params_serialize_as_tagged_union() {
        let request = CreateCollection {
            collection_id: "vecs".into(),
            collection_name: "Vectors".into(),
            params: CollectionParams::UserProvidedEmbeddings {
                embeddings_dimension: 3,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "collection_id": "vecs",
                "collection_name": "Vectors",
                "embeddings": "user_provided_embeddings",
                "embeddings_dimension": 3
            })
        );
        let back: CreateCollection = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn descriptor_feeds_validation_config() {
        let descriptor = CollectionDescriptor {
            collection_id: "c".into(),
            account_id: "a".into(),
            user_provided_embeddings: true,
            embeddings_dimension: Some(8),
        };
        let cfg = descriptor.validation_config("m");
        assert!(cfg.user_provided_embeddings);
        assert_eq!(cfg.embeddings_dimension, Some(8));
        assert!(cfg.validate().is_ok());
    }
}
