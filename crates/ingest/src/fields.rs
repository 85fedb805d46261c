//! Per-field validation rules for JSONL document records.
//!
//! Each validator looks at one logical field of a [`Record`] and returns the
//! violation it found, if any. Validators never fail for rule violations;
//! only the `text` validator can return an [`IngestError`], and only when the
//! tokenizer itself breaks.
//!
//! # Rules
//!
//! | Field | Rule |
//! |-------|------|
//! | `id` | required string, at most `max_id_chars` characters, no control characters (`\x00`-`\x1F`, `\x7F`-`\x9F`) |
//! | `operation` | optional; one of `add`, `delete`, `update` |
//! | `text` | required unless the collection is UPE; at most `max_text_tokens` tokens |
//! | `meta` / `meta_*` | suffix of `[A-Za-z0-9_-]`; value int, float, string, or a non-empty homogeneous list of those |
//! | `meta_ordered*` | value must be a float |
//! | `embeddings` | UPE only: required list of numbers whose length equals the collection dimension |
//!
//! [`validate_fields`] runs every rule and reports violations in the fixed
//! order `id`, `operation`, `text`, metadata (record key order), `embeddings`.
use serde_json::{Map, Value};

use crate::config::ValidationConfig;
use crate::error::IngestError;
use crate::tokenizer::TokenCounter;
use crate::types::FieldError;

/// One parsed JSONL line.
pub type Record = Map<String, Value>;

/// Values accepted for `operation`.
pub const OPERATIONS: [&str; 3] = ["add", "delete", "update"];

/// Prefix shared by every metadata key.
pub const META_PREFIX: &str = "meta";

/// Prefix of sortable metadata keys, whose values must be floats.
pub const META_ORDERED_PREFIX: &str = "meta_ordered";

/// Everything the field validators need besides the record itself.
#[derive(Clone, Copy)]
pub struct FieldContext<'a> {
    pub tokenizer: &'a dyn TokenCounter,
    pub model: &'a str,
    pub user_provided_embeddings: bool,
    pub embeddings_dimension: Option<usize>,
    pub max_text_tokens: usize,
    pub max_id_chars: usize,
}

impl<'a> FieldContext<'a> {
    pub fn new(cfg: &'a ValidationConfig, tokenizer: &'a dyn TokenCounter) -> Self {
        Self {
            tokenizer,
            model: &cfg.model,
            user_provided_embeddings: cfg.user_provided_embeddings,
            embeddings_dimension: cfg.embeddings_dimension,
            max_text_tokens: cfg.max_text_tokens,
            max_id_chars: cfg.max_id_chars,
        }
    }
}

/// Runs every field rule over `record` and returns the violations in field order.
pub fn validate_fields(
    record: &Record,
    ctx: &FieldContext<'_>,
) -> Result<Vec<FieldError>, IngestError> {
    let mut errors = Vec::new();
    errors.extend(validate_id(record, ctx));
    errors.extend(validate_operation(record));
    errors.extend(validate_text(record, ctx)?);
    errors.extend(validate_metadata(record));
    errors.extend(validate_embeddings(record, ctx));
    Ok(errors)
}

/// `id` must be present, a string, short enough, and free of control characters.
pub fn validate_id(record: &Record, ctx: &FieldContext<'_>) -> Option<FieldError> {
    let id = match present(record, "id") {
        None => return Some(missing("id")),
        Some(Value::String(id)) => id,
        Some(other) => {
            return Some(FieldError::new(
                "id",
                format!("id must be a string (got {})", json_kind(other)),
            ))
        }
    };

    if id.is_empty() {
        return Some(FieldError::new("id", "id must not be empty"));
    }
    let chars = id.chars().count();
    if chars > ctx.max_id_chars {
        return Some(FieldError::new(
            "id",
            format!(
                "id is {chars} characters long, exceeding the limit of {}",
                ctx.max_id_chars
            ),
        ));
    }
    if id.chars().any(is_forbidden_control) {
        return Some(FieldError::new("id", "id must not contain control characters"));
    }
    None
}

/// `operation` is optional; when given it must name a known operation.
pub fn validate_operation(record: &Record) -> Option<FieldError> {
    match present(record, "operation")? {
        Value::String(op) if OPERATIONS.contains(&op.as_str()) => None,
        Value::String(op) => Some(FieldError::new(
            "operation",
            format!("operation must be one of add, delete, update (got {op:?})"),
        )),
        other => Some(FieldError::new(
            "operation",
            format!("operation must be a string (got {})", json_kind(other)),
        )),
    }
}

/// `text` is required outside UPE collections and must fit the model's token limit.
pub fn validate_text(
    record: &Record,
    ctx: &FieldContext<'_>,
) -> Result<Option<FieldError>, IngestError> {
    let text = match present(record, "text") {
        None if ctx.user_provided_embeddings => return Ok(None),
        None => return Ok(Some(missing("text"))),
        Some(Value::String(text)) => text,
        Some(other) => {
            return Ok(Some(FieldError::new(
                "text",
                format!("text must be a string (got {})", json_kind(other)),
            )))
        }
    };

    let tokens = ctx.tokenizer.count_tokens(text)?;
    if tokens > ctx.max_text_tokens {
        return Ok(Some(FieldError::new(
            "text",
            format!(
                "text is {tokens} tokens long, exceeding the limit of {} tokens for model {}",
                ctx.max_text_tokens, ctx.model
            ),
        )));
    }
    Ok(None)
}

/// Checks every metadata entry of `record`, in key order.
pub fn validate_metadata(record: &Record) -> Vec<FieldError> {
    record
        .iter()
        .filter(|(key, _)| is_metadata_key(key))
        .filter_map(|(key, value)| validate_metadata_entry(key, value))
        .collect()
}

/// True for `meta` and every key starting with `meta_`.
pub fn is_metadata_key(key: &str) -> bool {
    key == META_PREFIX || key.starts_with("meta_")
}

/// Checks one metadata key and its value.
///
/// An empty list is rejected: there is no first element to anchor the
/// homogeneity check.
pub fn validate_metadata_entry(key: &str, value: &Value) -> Option<FieldError> {
    if let Some(err) = validate_metadata_key(key) {
        return Some(err);
    }

    if key.starts_with(META_ORDERED_PREFIX) {
        return match value {
            Value::Number(n) if n.is_f64() => None,
            other => Some(FieldError::new(
                key,
                format!(
                    "{key} is sortable metadata and must be a float (got {})",
                    json_kind(other)
                ),
            )),
        };
    }

    let type_error = |got: &Value| {
        FieldError::new(
            key,
            format!(
                "{key} must be an int, float, string, or a list of those (got {})",
                json_kind(got)
            ),
        )
    };

    match value {
        Value::Array(items) => {
            let Some(first) = items.first() else {
                return Some(FieldError::new(key, format!("{key} must not be an empty list")));
            };
            let Some(anchor) = ScalarKind::of(first) else {
                return Some(type_error(first));
            };
            for item in &items[1..] {
                match ScalarKind::of(item) {
                    None => return Some(type_error(item)),
                    Some(kind) if kind != anchor => {
                        return Some(FieldError::new(
                            key,
                            format!("{key} mixes numeric and string values in one list"),
                        ))
                    }
                    Some(_) => {}
                }
            }
            None
        }
        scalar if ScalarKind::of(scalar).is_some() => None,
        other => Some(type_error(other)),
    }
}

fn validate_metadata_key(key: &str) -> Option<FieldError> {
    let Some((_, suffix)) = key.split_once('_') else {
        return None;
    };
    if suffix.is_empty() {
        return Some(FieldError::new(key, "metadata key has an empty name after 'meta_'"));
    }
    if !suffix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Some(FieldError::new(
            key,
            format!("metadata key {key:?} may only contain letters, digits, '_' and '-'"),
        ));
    }
    None
}

/// UPE records must carry a numeric vector of exactly the collection's dimension.
pub fn validate_embeddings(record: &Record, ctx: &FieldContext<'_>) -> Option<FieldError> {
    if !ctx.user_provided_embeddings {
        return None;
    }

    let items = match present(record, "embeddings") {
        None => return Some(missing("embeddings")),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Some(FieldError::new(
                "embeddings",
                format!("embeddings must be a list of numbers (got {})", json_kind(other)),
            ))
        }
    };

    if let Some((idx, item)) = items.iter().enumerate().find(|(_, v)| !v.is_number()) {
        return Some(FieldError::new(
            "embeddings",
            format!(
                "embeddings must contain only numbers (element {idx} is {})",
                json_kind(item)
            ),
        ));
    }

    match ctx.embeddings_dimension {
        Some(expected) if items.len() != expected => Some(FieldError::new(
            "embeddings",
            format!(
                "embeddings has {} dimensions but the collection expects {expected}",
                items.len()
            ),
        )),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Numeric,
    Text,
}

impl ScalarKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Number(_) => Some(ScalarKind::Numeric),
            Value::String(_) => Some(ScalarKind::Text),
            _ => None,
        }
    }
}

/// A key counts as absent when it is missing or explicitly `null`.
fn present<'r>(record: &'r Record, key: &str) -> Option<&'r Value> {
    record.get(key).filter(|v| !v.is_null())
}

fn missing(field: &str) -> FieldError {
    FieldError::new(field, format!("Missing required field '{field}'"))
}

fn is_forbidden_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{1F}' | '\u{7F}'..='\u{9F}')
}

/// Short JSON type name for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
