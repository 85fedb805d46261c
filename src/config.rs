//! YAML Configuration File Support for Vantage ingest
//!
//! Loads everything a validation or upload run needs from one YAML file:
//! the collection's validation rules, batch bounds, upload target and the
//! tokenizer files to register per model. Values are passed explicitly into
//! the engine; nothing is read from the environment.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! # Vantage ingest configuration
//! version: "1.0"
//! name: "books nightly load"
//!
//! validation:
//!   model: "text-embedding-ada-002"
//!   user_provided_embeddings: true
//!   embeddings_dimension: 1536
//!   max_text_tokens: 8191
//!   reject_duplicate_ids: false
//!
//! batching:
//!   batch_size: 500
//!
//! upload:
//!   account_id: "acct-123"
//!   collection_id: "books"
//!   batch_identifier: "nightly"
//!   validate_before_upload: true
//!
//! tokenizers:
//!   text-embedding-ada-002: "models/ada/tokenizer.json"
//!
//! estimating_fallback: false
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ingest::{
    BatchConfig, EstimatingTokenizer, IngestError, TokenizerRegistry, ValidationConfig,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration for an ingest run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VantageConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Per-record validation rules of the target collection
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Batch bounds for file uploads
    #[serde(default)]
    pub batching: BatchConfig,

    /// Upload target
    #[serde(default)]
    pub upload: UploadYamlConfig,

    /// Model name to `tokenizer.json` path
    #[serde(default)]
    pub tokenizers: BTreeMap<String, PathBuf>,

    /// Over-estimate token counts for models without a tokenizer file
    #[serde(default = "true_value")]
    pub estimating_fallback: bool,
}

impl VantageConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: VantageConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.validation
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("validation: {e}")))?;
        self.batching
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("batching: {e}")))?;
        self.upload.validate()?;

        if !self.estimating_fallback && !self.tokenizers.contains_key(&self.validation.model) {
            return Err(ConfigLoadError::Validation(format!(
                "no tokenizer configured for model {:?} and estimating_fallback is off",
                self.validation.model
            )));
        }
        Ok(())
    }

    /// Builds the tokenizer registry this configuration describes.
    pub fn tokenizer_registry(&self) -> Result<TokenizerRegistry, IngestError> {
        let mut registry = TokenizerRegistry::new();
        if self.estimating_fallback {
            registry.set_fallback(Arc::new(EstimatingTokenizer));
        }
        for (model, path) in &self.tokenizers {
            registry.register(model.clone(), load_tokenizer(path)?);
        }
        Ok(registry)
    }
}

impl Default for VantageConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            validation: ValidationConfig::default(),
            batching: BatchConfig::default(),
            upload: UploadYamlConfig::default(),
            tokenizers: BTreeMap::new(),
            estimating_fallback: true,
        }
    }
}

/// Upload target YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadYamlConfig {
    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub collection_id: Option<String>,

    /// Label sent with every upload call of a run
    #[serde(default)]
    pub batch_identifier: Option<String>,

    /// Validate a JSONL file completely before its first batch is sent
    #[serde(default = "true_value")]
    pub validate_before_upload: bool,
}

impl Default for UploadYamlConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            collection_id: None,
            batch_identifier: None,
            validate_before_upload: true_value(),
        }
    }
}

impl UploadYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        for (name, value) in [
            ("upload.account_id", &self.account_id),
            ("upload.collection_id", &self.collection_id),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigLoadError::Validation(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(feature = "hf-tokenizers")]
fn load_tokenizer(path: &Path) -> Result<Arc<dyn ingest::TokenCounter>, IngestError> {
    Ok(Arc::new(ingest::HfTokenizer::from_file(path)?))
}

#[cfg(not(feature = "hf-tokenizers"))]
fn load_tokenizer(path: &Path) -> Result<Arc<dyn ingest::TokenCounter>, IngestError> {
    Err(IngestError::Tokenizer(format!(
        "cannot load {}: built without the hf-tokenizers feature",
        path.display()
    )))
}

fn true_value() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
validation:
  model: "text-embedding-ada-002"
  user_provided_embeddings: true
  embeddings_dimension: 3
batching:
  batch_size: 50
upload:
  account_id: "acct"
  collection_id: "books"
"#;

        let config = VantageConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert!(config.validation.user_provided_embeddings);
        assert_eq!(config.validation.embeddings_dimension, Some(3));
        assert_eq!(config.validation.max_text_tokens, 8191);
        assert_eq!(config.batching.batch_size, 50);
        assert_eq!(config.upload.collection_id.as_deref(), Some("books"));
        assert!(config.upload.validate_before_upload);
        assert!(config.estimating_fallback);
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1"
batching:
  batch_size: 10
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = VantageConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.batching.batch_size, 10);
    }

    #[test]
    fn test_default_config() {
        let config = VantageConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.name.is_none());
        assert_eq!(config.batching.batch_size, 500);
        assert!(!config.validation.user_provided_embeddings);
    }

    #[test]
    fn test_unsupported_version() {
        let result = VantageConfig::from_yaml("version: \"2.0\"\n");
        assert!(matches!(
            result,
            Err(ConfigLoadError::UnsupportedVersion(v)) if v == "2.0"
        ));
    }

    #[test]
    fn test_upe_without_dimension_rejected() {
        let yaml = r#"
version: "1.0"
validation:
  user_provided_embeddings: true
"#;

        let result = VantageConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("validation"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let yaml = r#"
version: "1.0"
batching:
  batch_size: 0
"#;

        let result = VantageConfig::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("batching"));
    }

    #[test]
    fn test_missing_tokenizer_without_fallback() {
        let yaml = r#"
version: "1.0"
estimating_fallback: false
"#;

        let result = VantageConfig::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("no tokenizer"));
    }

    #[test]
    fn test_registry_uses_estimating_fallback() {
        let config = VantageConfig::default();
        let registry = config.tokenizer_registry().unwrap();
        let counter = registry.resolve("any-model").unwrap();
        assert_eq!(counter.count_tokens("one two").unwrap(), 3);
    }

    #[test]
    fn test_default_config_rejects_unspaced_long_text() {
        let config = VantageConfig::default();
        let registry = config.tokenizer_registry().unwrap();
        let line = format!(
            "{{\"id\": \"cjk\", \"text\": \"{}\"}}",
            "文".repeat(20_000)
        );
        let errors = ingest::validate_jsonl_str(&line, &registry, &config.validation).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].has_field("text"));
    }

    #[test]
    fn test_default_upload_section_matches_omitted_yaml() {
        let from_yaml = VantageConfig::from_yaml("version: \"1.0\"\n").unwrap();
        assert!(from_yaml.upload.validate_before_upload);
        assert_eq!(
            VantageConfig::default().upload.validate_before_upload,
            from_yaml.upload.validate_before_upload
        );
        assert!(UploadYamlConfig::default().validate_before_upload);
    }
}
