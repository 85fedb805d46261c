//! Whole-file validation of JSONL document records.
//!
//! [`DocumentValidator`] streams a JSONL source line by line, runs the
//! [field rules](crate::fields) over every record and collects one
//! [`ValidationError`] per invalid line. The file is never held in memory as
//! a whole.
//!
//! Failures split two ways:
//!
//! - A line that is not valid JSON (or not a JSON object) aborts the run with
//!   an [`IngestError`]. Nothing collected so far is returned.
//! - Rule violations are collected and the scan continues, so a caller can
//!   fix a whole file in one pass.
//!
//! Whitespace-only lines are skipped but still count towards line numbers.
//!
//! ```rust
//! use ingest::{validate_jsonl_str, TokenizerRegistry, ValidationConfig};
//!
//! let body = concat!(
//!     r#"{"id": "a", "embeddings": [0.1, 0.2, 0.3]}"#, "\n",
//!     r#"{"embeddings": [0.1, 0.2, 0.3]}"#, "\n",
//! );
//! let cfg = ValidationConfig::user_provided("text-embedding-ada-002", 3);
//! let registry = TokenizerRegistry::with_estimating_fallback();
//!
//! let errors = validate_jsonl_str(body, &registry, &cfg).unwrap();
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].line_number, Some(1));
//! assert!(errors[0].has_field("id"));
//! ```
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ValidationConfig;
use crate::error::IngestError;
use crate::fields::{validate_fields, FieldContext, Record};
use crate::tokenizer::{TokenCounter, TokenizerRegistry};
use crate::types::{FieldError, ValidationError};

/// Validates JSONL records against one collection's rules.
///
/// The validator is stateful only when
/// [`reject_duplicate_ids`](ValidationConfig::reject_duplicate_ids) is on: it
/// then remembers every `id` it has seen. Whole-source runs
/// ([`validate_reader`](Self::validate_reader), [`validate_jsonl`](Self::validate_jsonl)
/// and the parallel variant) start from a clean slate. Ids fed through
/// [`validate_line`](Self::validate_line) or [`validate_record`](Self::validate_record)
/// accumulate until [`reset`](Self::reset) or the next whole-source run.
pub struct DocumentValidator {
    cfg: ValidationConfig,
    tokenizer: Arc<dyn TokenCounter>,
    seen_ids: HashMap<String, usize>,
}

impl DocumentValidator {
    /// Builds a validator, selecting the tokenizer for `cfg.model` from `registry`.
    pub fn new(cfg: ValidationConfig, registry: &TokenizerRegistry) -> Result<Self, IngestError> {
        let tokenizer = registry.resolve(&cfg.model)?;
        Self::with_tokenizer(cfg, tokenizer)
    }

    /// Builds a validator around an explicit token counter.
    pub fn with_tokenizer(
        cfg: ValidationConfig,
        tokenizer: Arc<dyn TokenCounter>,
    ) -> Result<Self, IngestError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            tokenizer,
            seen_ids: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.cfg
    }

    /// Forgets every `id` seen so far.
    pub fn reset(&mut self) {
        self.seen_ids.clear();
    }

    /// Validates one parsed record found at `line_number`.
    pub fn validate_record(
        &mut self,
        line_number: usize,
        record: &Record,
    ) -> Result<Option<ValidationError>, IngestError> {
        let errors = self.check_fields(record)?;
        Ok(self.finish_record(line_number, document_id(record), errors))
    }

    /// Parses and validates one JSONL line. Blank lines yield `Ok(None)`.
    pub fn validate_line(
        &mut self,
        line_number: usize,
        line: &str,
    ) -> Result<Option<ValidationError>, IngestError> {
        match parse_record(line_number, line)? {
            Some(record) => self.validate_record(line_number, &record),
            None => Ok(None),
        }
    }

    /// Validates every line of `reader`, returning the invalid records in line order.
    ///
    /// Ids remembered from earlier calls are forgotten first.
    pub fn validate_reader<R: BufRead>(
        &mut self,
        reader: R,
    ) -> Result<Vec<ValidationError>, IngestError> {
        self.reset();
        let start = Instant::now();
        let mut errors = Vec::new();
        let mut lines = 0usize;

        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            lines += 1;
            match self.validate_line(line_number, &line) {
                Ok(Some(err)) => {
                    debug!(line_number, fields = err.errors.len(), "invalid_record");
                    errors.push(err);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        error = %err,
                        line_number,
                        elapsed_micros = start.elapsed().as_micros(),
                        "validate_failure"
                    );
                    return Err(err);
                }
            }
        }

        log_summary(lines, &errors, start);
        Ok(errors)
    }

    /// Opens `path` and validates it line by line.
    pub fn validate_jsonl(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<ValidationError>, IngestError> {
        let path = path.as_ref();
        let span = tracing::info_span!(
            "ingest.validate_jsonl",
            path = %path.display(),
            model = %self.cfg.model,
            upe = self.cfg.user_provided_embeddings
        );
        let _guard = span.enter();

        let file = File::open(path).map_err(|err| {
            let err = IngestError::Io(format!("{}: {err}", path.display()));
            warn!(error = %err, "validate_failure");
            err
        })?;
        self.validate_reader(BufReader::new(file))
    }

    /// Validates `path` in chunks of `chunk_lines` lines, checking each chunk in parallel.
    ///
    /// Results are reassembled in line order and match [`validate_jsonl`](Self::validate_jsonl)
    /// exactly, including which structural error is reported first.
    #[cfg(feature = "parallel")]
    pub fn validate_jsonl_parallel(
        &mut self,
        path: impl AsRef<Path>,
        chunk_lines: usize,
    ) -> Result<Vec<ValidationError>, IngestError> {
        use rayon::prelude::*;

        if chunk_lines == 0 {
            return Err(IngestError::InvalidBatchSize);
        }
        let path = path.as_ref();
        let span = tracing::info_span!(
            "ingest.validate_jsonl_parallel",
            path = %path.display(),
            chunk_lines
        );
        let _guard = span.enter();

        self.reset();
        let start = Instant::now();
        let file = File::open(path)
            .map_err(|err| IngestError::Io(format!("{}: {err}", path.display())))?;
        let mut lines = BufReader::new(file).lines().enumerate();
        let mut errors = Vec::new();
        let mut total = 0usize;

        loop {
            let mut chunk = Vec::with_capacity(chunk_lines);
            for (line_number, line) in lines.by_ref().take(chunk_lines) {
                chunk.push((line_number, line?));
            }
            if chunk.is_empty() {
                break;
            }
            total += chunk.len();

            let checked: Vec<Result<Option<CheckedRecord>, IngestError>> = chunk
                .par_iter()
                .map(|(line_number, line)| {
                    let Some(record) = parse_record(*line_number, line)? else {
                        return Ok(None);
                    };
                    let field_errors = self.check_fields(&record)?;
                    Ok(Some(CheckedRecord {
                        line_number: *line_number,
                        document_id: document_id(&record),
                        errors: field_errors,
                    }))
                })
                .collect();

            for result in checked {
                let Some(rec) = result.inspect_err(|err| {
                    warn!(error = %err, "validate_failure");
                })?
                else {
                    continue;
                };
                if let Some(err) = self.finish_record(rec.line_number, rec.document_id, rec.errors)
                {
                    errors.push(err);
                }
            }
        }

        log_summary(total, &errors, start);
        Ok(errors)
    }

    fn check_fields(&self, record: &Record) -> Result<Vec<FieldError>, IngestError> {
        let ctx = FieldContext::new(&self.cfg, &*self.tokenizer);
        validate_fields(record, &ctx)
    }

    /// Applies cross-line state and wraps non-empty field errors.
    fn finish_record(
        &mut self,
        line_number: usize,
        document_id: Option<String>,
        mut errors: Vec<FieldError>,
    ) -> Option<ValidationError> {
        if self.cfg.reject_duplicate_ids && !errors.iter().any(|e| e.field_name == "id") {
            if let Some(id) = document_id.as_deref() {
                match self.seen_ids.get(id) {
                    Some(first) => errors.insert(
                        0,
                        FieldError::new(
                            "id",
                            format!("duplicate id {id:?}, first seen on line {first}"),
                        ),
                    ),
                    None => {
                        self.seen_ids.insert(id.to_string(), line_number);
                    }
                }
            }
        }

        if errors.is_empty() {
            None
        } else {
            Some(ValidationError {
                document_id,
                line_number: Some(line_number),
                errors,
            })
        }
    }
}

#[cfg(feature = "parallel")]
struct CheckedRecord {
    line_number: usize,
    document_id: Option<String>,
    errors: Vec<FieldError>,
}

/// Validates the JSONL file at `path` with the tokenizer `cfg.model` resolves to.
pub fn validate_jsonl(
    path: impl AsRef<Path>,
    registry: &TokenizerRegistry,
    cfg: &ValidationConfig,
) -> Result<Vec<ValidationError>, IngestError> {
    DocumentValidator::new(cfg.clone(), registry)?.validate_jsonl(path)
}

/// Validates an in-memory JSONL body.
pub fn validate_jsonl_str(
    body: &str,
    registry: &TokenizerRegistry,
    cfg: &ValidationConfig,
) -> Result<Vec<ValidationError>, IngestError> {
    DocumentValidator::new(cfg.clone(), registry)?.validate_reader(body.as_bytes())
}

/// Parses one line into a record. Blank lines yield `Ok(None)`.
pub fn parse_record(line_number: usize, line: &str) -> Result<Option<Record>, IngestError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(record)) => Ok(Some(record)),
        Ok(_) => Err(IngestError::NotAnObject { line_number }),
        Err(err) => Err(IngestError::MalformedJson {
            line_number,
            message: err.to_string(),
        }),
    }
}

fn document_id(record: &Record) -> Option<String> {
    record.get("id").and_then(Value::as_str).map(str::to_string)
}

fn log_summary(lines: usize, errors: &[ValidationError], start: Instant) {
    let elapsed_micros = start.elapsed().as_micros();
    if errors.is_empty() {
        info!(lines, elapsed_micros, "validate_success");
    } else {
        warn!(
            lines,
            invalid_records = errors.len(),
            elapsed_micros,
            "validate_invalid_records"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tokenizer::WhitespaceTokenizer;

    fn validator(cfg: ValidationConfig) -> DocumentValidator {
        DocumentValidator::with_tokenizer(cfg, Arc::new(WhitespaceTokenizer))
            .expect("valid config")
    }

    #[test]
    fn mixed_file_reports_only_invalid_lines() {
        let body = [
            json!({"id": "ok", "embeddings": [0.1, 0.2, 0.3]}).to_string(),
            json!({"embeddings": [0.1, 0.2, 0.3]}).to_string(),
            json!({"id": "c", "embeddings": [0.1, 0.2, 0.3], "meta_ordered_x": "not-a-float"})
                .to_string(),
        ]
        .join("\n");

        let mut v = validator(ValidationConfig::user_provided("m", 3));
        let errors = v.validate_reader(body.as_bytes()).unwrap();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line_number, Some(1));
        assert_eq!(errors[0].document_id, None);
        assert!(errors[0].has_field("id"));
        assert_eq!(errors[1].line_number, Some(2));
        assert_eq!(errors[1].document_id.as_deref(), Some("c"));
        assert!(errors[1].has_field("meta_ordered_x"));
    }

    #[test]
    fn malformed_json_aborts_the_run() {
        let body = "{\"id\": \"a\", \"text\": \"t\"}\n{\"id\": \n{\"text\": \"x\"}\n";
        let mut v = validator(ValidationConfig::default());
        let err = v.validate_reader(body.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedJson { line_number: 1, .. }));
    }

    #[test]
    fn non_object_line_aborts_the_run() {
        let mut v = validator(ValidationConfig::default());
        let err = v.validate_reader("[1, 2]\n".as_bytes()).unwrap_err();
        assert_eq!(err, IngestError::NotAnObject { line_number: 0 });
    }

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let body = "{\"id\": \"a\", \"text\": \"t\"}\r\n\r\n{\"text\": \"t\"}\r\n";
        let mut v = validator(ValidationConfig::default());
        let errors = v.validate_reader(body.as_bytes()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line_number, Some(2));
    }

    #[test]
    fn duplicate_ids_ignored_by_default() {
        let body = "{\"id\": \"a\", \"text\": \"t\"}\n{\"id\": \"a\", \"text\": \"t\"}\n";
        let mut v = validator(ValidationConfig::default());
        assert!(v.validate_reader(body.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_ids_reported_when_enabled() {
        let body = concat!(
            "{\"id\": \"a\", \"text\": \"t\"}\n",
            "{\"id\": \"b\", \"text\": \"t\"}\n",
            "{\"id\": \"a\", \"operation\": \"nope\", \"text\": \"t\"}\n",
        );
        let cfg = ValidationConfig {
            reject_duplicate_ids: true,
            ..Default::default()
        };
        let mut v = validator(cfg);
        let errors = v.validate_reader(body.as_bytes()).unwrap();

        assert_eq!(errors.len(), 1);
        let names: Vec<&str> = errors[0].field_names().collect();
        assert_eq!(names, ["id", "operation"]);
        assert!(errors[0].errors[0].error_message.contains("first seen on line 0"));

        v.reset();
        assert!(v
            .validate_line(5, "{\"id\": \"a\", \"text\": \"t\"}")
            .unwrap()
            .is_none());
    }

    #[test]
    fn repeated_runs_do_not_share_seen_ids() {
        let body = "{\"id\": \"a\", \"text\": \"t\"}\n{\"id\": \"b\", \"text\": \"t\"}\n";
        let cfg = ValidationConfig {
            reject_duplicate_ids: true,
            ..Default::default()
        };
        let mut v = validator(cfg);
        assert!(v.validate_reader(body.as_bytes()).unwrap().is_empty());
        assert!(v.validate_reader(body.as_bytes()).unwrap().is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, body.as_bytes()).unwrap();
        assert!(v.validate_jsonl(file.path()).unwrap().is_empty());
        assert!(v.validate_jsonl(file.path()).unwrap().is_empty());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn repeated_parallel_runs_do_not_share_seen_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"{\"id\": \"a\", \"text\": \"t\"}\n{\"id\": \"b\", \"text\": \"t\"}\n",
        )
        .unwrap();
        let cfg = ValidationConfig {
            reject_duplicate_ids: true,
            ..Default::default()
        };
        let mut v = validator(cfg);
        assert!(v.validate_jsonl_parallel(file.path(), 1).unwrap().is_empty());
        assert!(v.validate_jsonl_parallel(file.path(), 1).unwrap().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let cfg = ValidationConfig {
            user_provided_embeddings: true,
            ..Default::default()
        };
        let err = DocumentValidator::with_tokenizer(cfg, Arc::new(WhitespaceTokenizer))
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn unknown_model_is_rejected_up_front() {
        let err = validate_jsonl_str("", &TokenizerRegistry::new(), &ValidationConfig::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::UnknownModel(_)));
    }

    #[test]
    fn parse_record_skips_blank_lines() {
        assert!(parse_record(0, "   \t").unwrap().is_none());
        assert!(parse_record(0, "{}").unwrap().is_some());
    }
}
