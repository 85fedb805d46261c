//! Workspace umbrella crate for Vantage document ingest.
//!
//! This crate ties the ingest engine to a YAML configuration so callers
//! (and the `vantage-ingest` binary) can validate, split and upload JSONL
//! files with one call per operation.

pub mod config;

pub use config::{ConfigLoadError, UploadYamlConfig, VantageConfig};
pub use ingest::{
    BatchConfig, BatchReader, CollectionDescriptor, CollectionLookup, CollectionParams,
    CreateCollection, Document, DocumentValidator, EmbeddingMode, FieldError, IngestError,
    Ingestor, MetadataItem, MetadataValue, TokenCounter, TokenizerRegistry, TransportError,
    UploadOutcome, UploadTransport, ValidationConfig, ValidationError, count_lines,
    split_batches, validate_jsonl, validate_jsonl_str,
};

use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

/// Lines per chunk when validating in parallel.
pub const PARALLEL_CHUNK_LINES: usize = 4096;

/// Errors that can occur while running an ingest operation from configuration.
#[derive(Debug)]
pub enum VantageError {
    Ingest(IngestError),
    Config(ConfigLoadError),
    MissingUploadTarget(&'static str),
    ParallelUnavailable,
}

impl fmt::Display for VantageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VantageError::Ingest(err) => write!(f, "ingest failure: {err}"),
            VantageError::Config(err) => write!(f, "configuration failure: {err}"),
            VantageError::MissingUploadTarget(field) => {
                write!(f, "upload.{field} must be set to upload")
            }
            VantageError::ParallelUnavailable => {
                write!(f, "parallel validation requires the `parallel` feature")
            }
        }
    }
}

impl Error for VantageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VantageError::Ingest(err) => Some(err),
            VantageError::Config(err) => Some(err),
            VantageError::MissingUploadTarget(_) | VantageError::ParallelUnavailable => None,
        }
    }
}

impl From<IngestError> for VantageError {
    fn from(value: IngestError) -> Self {
        VantageError::Ingest(value)
    }
}

impl From<ConfigLoadError> for VantageError {
    fn from(value: ConfigLoadError) -> Self {
        VantageError::Config(value)
    }
}

/// Validates the JSONL file at `path` with the rules and tokenizers of `config`.
pub fn validate_file(
    config: &VantageConfig,
    path: impl AsRef<Path>,
    parallel: bool,
) -> Result<Vec<ValidationError>, VantageError> {
    let registry = config.tokenizer_registry()?;
    let mut validator = DocumentValidator::new(config.validation.clone(), &registry)?;
    if parallel {
        return validate_parallel(&mut validator, path.as_ref());
    }
    Ok(validator.validate_jsonl(path)?)
}

#[cfg(feature = "parallel")]
fn validate_parallel(
    validator: &mut DocumentValidator,
    path: &Path,
) -> Result<Vec<ValidationError>, VantageError> {
    Ok(validator.validate_jsonl_parallel(path, PARALLEL_CHUNK_LINES)?)
}

#[cfg(not(feature = "parallel"))]
fn validate_parallel(
    _validator: &mut DocumentValidator,
    _path: &Path,
) -> Result<Vec<ValidationError>, VantageError> {
    Err(VantageError::ParallelUnavailable)
}

/// Writes the batches of the JSONL file at `path` into `out_dir` as
/// `batch-00000.jsonl`, `batch-00001.jsonl`, ... and returns their paths.
///
/// Whitespace-only lines are dropped.
pub fn split_file(
    path: impl AsRef<Path>,
    batching: BatchConfig,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, VantageError> {
    let path = path.as_ref();
    let out_dir = out_dir.as_ref();
    let start = Instant::now();

    let file = File::open(path)
        .map_err(|err| IngestError::Io(format!("{}: {err}", path.display())))?;
    fs::create_dir_all(out_dir).map_err(IngestError::from)?;

    let mut written = Vec::new();
    for batch in BatchReader::new(BufReader::new(file), batching.batch_size)? {
        let batch = batch?;
        let target = out_dir.join(format!("batch-{:05}.jsonl", written.len()));
        fs::write(&target, batch).map_err(IngestError::from)?;
        written.push(target);
    }

    info!(
        path = %path.display(),
        batches = written.len(),
        batch_size = batching.batch_size,
        elapsed_micros = start.elapsed().as_micros(),
        "split_success"
    );
    Ok(written)
}

/// Counts the lines of the file at `path` with [`count_lines`].
pub fn count_file_lines(path: impl AsRef<Path>) -> Result<usize, VantageError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|err| IngestError::Io(format!("{}: {err}", path.display())))?;
    Ok(count_lines(&text))
}

/// Uploads the JSONL file at `path` to the collection named in `config.upload`.
///
/// The collection is looked up first so validation runs against its actual
/// embedding mode and dimension. Model and limits come from `config.validation`.
pub fn upload_file<T>(
    config: &VantageConfig,
    transport: T,
    path: impl AsRef<Path>,
) -> Result<UploadOutcome, VantageError>
where
    T: UploadTransport + CollectionLookup,
{
    let account_id = config
        .upload
        .account_id
        .as_deref()
        .ok_or(VantageError::MissingUploadTarget("account_id"))?;
    let collection_id = config
        .upload
        .collection_id
        .as_deref()
        .ok_or(VantageError::MissingUploadTarget("collection_id"))?;

    let ingestor = Ingestor::new(transport);
    let collection = ingestor.collection(collection_id, account_id)?;

    let mut validator = if config.upload.validate_before_upload {
        let cfg = ValidationConfig {
            user_provided_embeddings: collection.user_provided_embeddings,
            embeddings_dimension: collection.embeddings_dimension,
            ..config.validation.clone()
        };
        Some(DocumentValidator::new(cfg, &config.tokenizer_registry()?)?)
    } else {
        None
    };

    let outcome = ingestor.upsert_jsonl_file(
        &collection,
        path,
        config.batching,
        validator.as_mut(),
        config.upload.batch_identifier.as_deref(),
    )?;
    if let UploadOutcome::Invalid(errors) = &outcome {
        warn!(
            collection_id,
            invalid_records = errors.len(),
            "upload_skipped_invalid"
        );
    }
    Ok(outcome)
}
