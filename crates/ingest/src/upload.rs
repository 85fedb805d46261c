//! Ingestion facade: compatibility checks, serialization and upload.
//!
//! The HTTP layer is not part of this crate. [`UploadTransport`] and
//! [`CollectionLookup`] are the seams a client plugs into; [`Ingestor`]
//! drives them. Every compatibility check runs before the first transport
//! call, so a rejected request never leaves a partial upload behind.
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::batch::BatchReader;
use crate::collection::{CollectionDescriptor, EmbeddingMode};
use crate::config::{BatchConfig, ValidationConfig};
use crate::document::{to_jsonl_body, Document};
use crate::error::{IngestError, TransportError};
use crate::types::ValidationError;
use crate::validator::DocumentValidator;

/// Status code a successful `put` to an upload URL returns.
const PUT_OK: u16 = 200;

/// Sends upload bodies to the service.
pub trait UploadTransport {
    /// Uploads a newline-separated JSONL body into a collection.
    fn upload_documents(
        &self,
        account_id: &str,
        collection_id: &str,
        body: &str,
        batch_identifier: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Asks the service for a URL that accepts a binary file of `file_size` bytes.
    fn request_upload_url(
        &self,
        account_id: &str,
        collection_id: &str,
        file_size: u64,
        batch_identifier: Option<&str>,
    ) -> Result<String, TransportError>;

    /// Sends raw bytes to an upload URL and returns the HTTP status.
    fn put(&self, upload_url: &str, bytes: &[u8]) -> Result<u16, TransportError>;
}

/// Resolves collection ids to their descriptors.
pub trait CollectionLookup {
    fn get_collection(
        &self,
        collection_id: &str,
        account_id: &str,
    ) -> Result<CollectionDescriptor, TransportError>;
}

/// Result of a file upload that may stop at validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every batch was accepted.
    Uploaded { batches: usize, lines: usize },
    /// Pre-validation found invalid records. Nothing was uploaded.
    Invalid(Vec<ValidationError>),
}

impl UploadOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded { .. })
    }
}

/// Drives an [`UploadTransport`] on behalf of callers.
///
/// ```rust
/// use std::cell::RefCell;
/// use ingest::{CollectionDescriptor, Document, Ingestor, TransportError, UploadTransport};
///
/// #[derive(Default)]
/// struct Recorder(RefCell<Vec<String>>);
///
/// impl UploadTransport for Recorder {
///     fn upload_documents(&self, _: &str, _: &str, body: &str, _: Option<&str>) -> Result<(), TransportError> {
///         self.0.borrow_mut().push(body.to_string());
///         Ok(())
///     }
///     fn request_upload_url(&self, _: &str, _: &str, _: u64, _: Option<&str>) -> Result<String, TransportError> {
///         Ok("https://upload.invalid/1".into())
///     }
///     fn put(&self, _: &str, _: &[u8]) -> Result<u16, TransportError> {
///         Ok(200)
///     }
/// }
///
/// let collection = CollectionDescriptor {
///     collection_id: "books".into(),
///     account_id: "acct".into(),
///     user_provided_embeddings: false,
///     embeddings_dimension: None,
/// };
/// let ingestor = Ingestor::new(Recorder::default());
/// ingestor
///     .upsert_documents(&collection, &[Document::new("hello").with_id("d1")], None)
///     .unwrap();
/// assert_eq!(ingestor.transport().0.borrow()[0], r#"{"id":"d1","text":"hello"}"#);
/// ```
#[derive(Debug)]
pub struct Ingestor<T> {
    transport: T,
}

impl<T: UploadTransport> Ingestor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Looks up the descriptor for `collection_id` under `account_id`.
    pub fn collection(
        &self,
        collection_id: &str,
        account_id: &str,
    ) -> Result<CollectionDescriptor, IngestError>
    where
        T: CollectionLookup,
    {
        Ok(self.transport.get_collection(collection_id, account_id)?)
    }

    /// Uploads typed documents as one JSONL body.
    ///
    /// Fails before any transport call when `documents` is empty, when any
    /// document's variant disagrees with the collection, or when a
    /// user-provided vector has the wrong length.
    pub fn upsert_documents(
        &self,
        collection: &CollectionDescriptor,
        documents: &[Document],
        batch_identifier: Option<&str>,
    ) -> Result<(), IngestError> {
        let start = Instant::now();
        let span = tracing::info_span!(
            "ingest.upsert_documents",
            collection_id = %collection.collection_id,
            documents = documents.len()
        );
        let _guard = span.enter();

        let result = check_documents(collection, documents)
            .and_then(|()| to_jsonl_body(documents))
            .and_then(|body| {
                self.transport
                    .upload_documents(
                        &collection.account_id,
                        &collection.collection_id,
                        &body,
                        batch_identifier,
                    )
                    .map_err(IngestError::from)
            });
        log_result(&result, start, "upsert");
        result
    }

    /// Uploads a raw JSONL body as-is.
    pub fn upsert_jsonl(
        &self,
        collection: &CollectionDescriptor,
        body: &str,
        batch_identifier: Option<&str>,
    ) -> Result<(), IngestError> {
        if body.trim().is_empty() {
            return Err(IngestError::EmptyDocuments);
        }
        self.transport.upload_documents(
            &collection.account_id,
            &collection.collection_id,
            body,
            batch_identifier,
        )?;
        info!(
            collection_id = %collection.collection_id,
            bytes = body.len(),
            "upsert_success"
        );
        Ok(())
    }

    /// Uploads a JSONL file in batches of `batching.batch_size` lines.
    ///
    /// With a `validator`, its embedding mode and dimension must match the
    /// collection, then the whole file is validated first and any invalid
    /// record returns [`UploadOutcome::Invalid`] with nothing uploaded.
    /// When a `batch_identifier` is given, batch `n` is sent as
    /// `"{batch_identifier}-{n}"`.
    pub fn upsert_jsonl_file(
        &self,
        collection: &CollectionDescriptor,
        path: impl AsRef<Path>,
        batching: BatchConfig,
        validator: Option<&mut DocumentValidator>,
        batch_identifier: Option<&str>,
    ) -> Result<UploadOutcome, IngestError> {
        let path = path.as_ref();
        let start = Instant::now();
        let span = tracing::info_span!(
            "ingest.upsert_jsonl_file",
            collection_id = %collection.collection_id,
            path = %path.display(),
            batch_size = batching.batch_size
        );
        let _guard = span.enter();

        batching.validate()?;
        if let Some(validator) = validator {
            if let Err(err) = check_validation_config(collection, validator.config()) {
                warn!(error = %err, "upsert_failure");
                return Err(err);
            }
            let errors = validator.validate_jsonl(path)?;
            if !errors.is_empty() {
                warn!(invalid_records = errors.len(), "upsert_skipped_invalid");
                return Ok(UploadOutcome::Invalid(errors));
            }
        }

        let file = File::open(path)
            .map_err(|err| IngestError::Io(format!("{}: {err}", path.display())))?;
        let mut batches = 0usize;
        let mut lines = 0usize;
        for batch in BatchReader::new(BufReader::new(file), batching.batch_size)? {
            let batch = batch?;
            let label = batch_identifier.map(|id| format!("{id}-{batches}"));
            let result = self.transport.upload_documents(
                &collection.account_id,
                &collection.collection_id,
                &batch,
                label.as_deref(),
            );
            if let Err(err) = result {
                warn!(
                    error = %err,
                    batch = batches,
                    elapsed_micros = start.elapsed().as_micros(),
                    "upsert_failure"
                );
                return Err(err.into());
            }
            let batch_lines = batch.lines().count();
            debug!(batch = batches, lines = batch_lines, "batch_uploaded");
            batches += 1;
            lines += batch_lines;
        }

        if batches == 0 {
            return Err(IngestError::EmptyUploadFile(path.display().to_string()));
        }
        info!(
            batches,
            lines,
            elapsed_micros = start.elapsed().as_micros(),
            "upsert_success"
        );
        Ok(UploadOutcome::Uploaded { batches, lines })
    }

    /// Uploads a binary (parquet) file through a requested upload URL.
    pub fn upload_parquet_file(
        &self,
        collection: &CollectionDescriptor,
        path: impl AsRef<Path>,
        batch_identifier: Option<&str>,
    ) -> Result<(), IngestError> {
        let path = path.as_ref();
        let start = Instant::now();
        let span = tracing::info_span!(
            "ingest.upload_parquet_file",
            collection_id = %collection.collection_id,
            path = %path.display()
        );
        let _guard = span.enter();

        let bytes =
            fs::read(path).map_err(|err| IngestError::Io(format!("{}: {err}", path.display())))?;
        if bytes.is_empty() {
            return Err(IngestError::EmptyUploadFile(path.display().to_string()));
        }

        let result = self
            .transport
            .request_upload_url(
                &collection.account_id,
                &collection.collection_id,
                bytes.len() as u64,
                batch_identifier,
            )
            .and_then(|url| self.transport.put(&url, &bytes))
            .and_then(|status| match status {
                PUT_OK => Ok(()),
                status => Err(TransportError::Rejected {
                    status,
                    message: format!("upload of {} was not accepted", path.display()),
                }),
            })
            .map_err(IngestError::from);
        log_result(&result, start, "upload");
        result
    }
}

/// Fails on the first document that cannot go into `collection`.
fn check_documents(
    collection: &CollectionDescriptor,
    documents: &[Document],
) -> Result<(), IngestError> {
    if documents.is_empty() {
        return Err(IngestError::EmptyDocuments);
    }

    let expected = collection.embedding_mode();
    for (index, doc) in documents.iter().enumerate() {
        let found = doc.embedding_mode();
        if found != expected {
            return Err(IngestError::EmbeddingModeMismatch {
                collection_id: collection.collection_id.clone(),
                index,
                expected,
                found,
            });
        }
        if let (Some(expected), Some(embeddings)) =
            (collection.embeddings_dimension, doc.embeddings())
        {
            if embeddings.len() != expected {
                return Err(IngestError::EmbeddingsDimensionMismatch {
                    collection_id: collection.collection_id.clone(),
                    index,
                    expected,
                    actual: embeddings.len(),
                });
            }
        }
    }
    Ok(())
}

/// Rejects a validator whose embedding rules disagree with the target collection.
fn check_validation_config(
    collection: &CollectionDescriptor,
    cfg: &ValidationConfig,
) -> Result<(), IngestError> {
    let expected = collection.embedding_mode();
    if cfg.user_provided_embeddings != expected.is_user_provided() {
        return Err(IngestError::EmbeddingModeMismatch {
            collection_id: collection.collection_id.clone(),
            index: 0,
            expected,
            found: if cfg.user_provided_embeddings {
                EmbeddingMode::UserProvided
            } else {
                EmbeddingMode::VantageManaged
            },
        });
    }
    if let (Some(expected), Some(actual)) =
        (collection.embeddings_dimension, cfg.embeddings_dimension)
    {
        if cfg.user_provided_embeddings && actual != expected {
            return Err(IngestError::EmbeddingsDimensionMismatch {
                collection_id: collection.collection_id.clone(),
                index: 0,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

fn log_result(result: &Result<(), IngestError>, start: Instant, op: &'static str) {
    let elapsed_micros = start.elapsed().as_micros();
    match result {
        Ok(()) => info!(op, elapsed_micros, "upload_success"),
        Err(err) => warn!(op, error = %err, elapsed_micros, "upload_failure"),
    }
}
