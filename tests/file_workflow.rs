use std::cell::RefCell;
use std::fs;
use std::io::Write;

use tempfile::NamedTempFile;
use vantage::{
    BatchConfig, CollectionDescriptor, CollectionLookup, TransportError, UploadOutcome,
    UploadTransport, VantageConfig, VantageError, count_file_lines, split_file, upload_file,
    validate_file,
};

fn jsonl_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[derive(Default)]
struct FakeService {
    bodies: RefCell<Vec<(String, Option<String>)>>,
}

impl UploadTransport for &FakeService {
    fn upload_documents(
        &self,
        _account_id: &str,
        _collection_id: &str,
        body: &str,
        batch_identifier: Option<&str>,
    ) -> Result<(), TransportError> {
        self.bodies
            .borrow_mut()
            .push((body.to_string(), batch_identifier.map(str::to_string)));
        Ok(())
    }

    fn request_upload_url(
        &self,
        _account_id: &str,
        _collection_id: &str,
        _file_size: u64,
        _batch_identifier: Option<&str>,
    ) -> Result<String, TransportError> {
        Err(TransportError::Network("not used".into()))
    }

    fn put(&self, _upload_url: &str, _bytes: &[u8]) -> Result<u16, TransportError> {
        Err(TransportError::Network("not used".into()))
    }
}

impl CollectionLookup for &FakeService {
    fn get_collection(
        &self,
        collection_id: &str,
        account_id: &str,
    ) -> Result<CollectionDescriptor, TransportError> {
        Ok(CollectionDescriptor {
            collection_id: collection_id.into(),
            account_id: account_id.into(),
            user_provided_embeddings: true,
            embeddings_dimension: Some(2),
        })
    }
}

fn upload_config(batch_size: usize) -> VantageConfig {
    VantageConfig::from_yaml(&format!(
        r#"
version: "1.0"
batching:
  batch_size: {batch_size}
upload:
  account_id: "acct"
  collection_id: "vectors"
  batch_identifier: "run"
"#
    ))
    .unwrap()
}

#[test]
fn validate_file_uses_config_rules() {
    let config = VantageConfig::from_yaml(
        r#"
version: "1.0"
validation:
  user_provided_embeddings: true
  embeddings_dimension: 3
  reject_duplicate_ids: true
"#,
    )
    .unwrap();
    let file = jsonl_file(concat!(
        "{\"id\": \"a\", \"embeddings\": [1.0, 2.0, 3.0]}\n",
        "{\"id\": \"a\", \"embeddings\": [1.0, 2.0, 3.0]}\n",
        "{\"id\": \"b\", \"embeddings\": [1.0, 2.0]}\n",
    ));

    let errors = validate_file(&config, file.path(), false).unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].has_field("id"));
    assert_eq!(errors[0].line_number, Some(1));
    assert!(errors[1].has_field("embeddings"));
}

#[test]
fn split_file_writes_numbered_batches() {
    let file = jsonl_file("{\"id\":1}\n{\"id\":2}\n\n{\"id\":3}\n{\"id\":4}\n{\"id\":5}");
    let out = tempfile::tempdir().unwrap();

    let written = split_file(file.path(), BatchConfig { batch_size: 2 }, out.path()).unwrap();
    let names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        ["batch-00000.jsonl", "batch-00001.jsonl", "batch-00002.jsonl"]
    );
    assert_eq!(fs::read_to_string(&written[1]).unwrap(), "{\"id\":3}\n{\"id\":4}\n");
    assert_eq!(fs::read_to_string(&written[2]).unwrap(), "{\"id\":5}");
}

#[test]
fn count_file_lines_counts_final_line() {
    let file = jsonl_file("a\r\nb\nc");
    assert_eq!(count_file_lines(file.path()).unwrap(), 3);
}

#[test]
fn upload_validates_against_looked_up_collection() {
    let service = FakeService::default();
    let file = jsonl_file(concat!(
        "{\"id\": \"a\", \"embeddings\": [0.1, 0.2]}\n",
        "{\"id\": \"b\", \"embeddings\": [0.1, 0.2, 0.3]}\n",
    ));

    let outcome = upload_file(&upload_config(10), &service, file.path()).unwrap();
    match outcome {
        UploadOutcome::Invalid(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].document_id.as_deref(), Some("b"));
        }
        other => panic!("expected invalid outcome, got {other:?}"),
    }
    assert!(service.bodies.borrow().is_empty());
}

#[test]
fn upload_sends_labelled_batches() {
    let service = FakeService::default();
    let file = jsonl_file(concat!(
        "{\"id\": \"a\", \"embeddings\": [0.1, 0.2]}\n",
        "{\"id\": \"b\", \"embeddings\": [0.3, 0.4]}\n",
        "{\"id\": \"c\", \"embeddings\": [0.5, 0.6]}\n",
    ));

    let outcome = upload_file(&upload_config(2), &service, file.path()).unwrap();
    assert_eq!(
        outcome,
        UploadOutcome::Uploaded {
            batches: 2,
            lines: 3
        }
    );
    let bodies = service.bodies.borrow();
    assert_eq!(bodies[0].1.as_deref(), Some("run-0"));
    assert_eq!(bodies[1].1.as_deref(), Some("run-1"));
}

#[test]
fn upload_requires_a_target() {
    let service = FakeService::default();
    let file = jsonl_file("{\"id\": \"a\"}\n");
    let err = upload_file(&VantageConfig::default(), &service, file.path()).unwrap_err();
    assert!(matches!(err, VantageError::MissingUploadTarget("account_id")));
}
