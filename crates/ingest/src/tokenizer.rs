//! Token counting for `text` length limits.
//!
//! The validator only needs one number per text: how many tokens the target
//! embedding model will see. [`TokenCounter`] is that seam. A
//! [`TokenizerRegistry`] maps model names to counters so a validation run can
//! select one from [`ValidationConfig::model`](crate::ValidationConfig::model).
//!
//! - [`HfTokenizer`] (feature `hf-tokenizers`) wraps a `tokenizer.json`.
//! - [`WhitespaceTokenizer`] counts whitespace-separated words. Exact for
//!   word-level models, mostly useful in tests.
//! - [`EstimatingTokenizer`] over-estimates BPE token counts without a
//!   vocabulary. It is the fallback for models that have no tokenizer file.
//!
//! ```rust
//! use std::sync::Arc;
//! use ingest::{TokenCounter, TokenizerRegistry, WhitespaceTokenizer};
//!
//! let mut registry = TokenizerRegistry::new();
//! registry.register("my-model", Arc::new(WhitespaceTokenizer));
//!
//! let counter = registry.resolve("my-model").unwrap();
//! assert_eq!(counter.count_tokens("three short words").unwrap(), 3);
//! assert!(registry.resolve("other-model").is_err());
//! ```
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::IngestError;

/// ASCII bytes per token assumed by [`EstimatingTokenizer`]. BPE vocabularies average closer to 4.
const ASCII_BYTES_PER_TOKEN: usize = 3;

/// Counts the tokens a model would produce for a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of token ids `text` encodes to.
    fn count_tokens(&self, text: &str) -> Result<usize, IngestError>;
}

/// Counts maximal runs of non-whitespace characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl TokenCounter for WhitespaceTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize, IngestError> {
        Ok(text.split_whitespace().count())
    }
}

/// Upper-bound estimate of a BPE token count.
///
/// ASCII text is counted at one token per three bytes and every other
/// character as one token of its own, so unbroken runs and CJK text are not
/// undercounted. The estimate is never below the whitespace word count.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingTokenizer;

impl TokenCounter for EstimatingTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize, IngestError> {
        let (ascii, other) = text.chars().fold((0usize, 0usize), |(ascii, other), c| {
            if c.is_ascii() {
                (ascii + 1, other)
            } else {
                (ascii, other + 1)
            }
        });
        let estimate = ascii.div_ceil(ASCII_BYTES_PER_TOKEN) + other;
        Ok(estimate.max(text.split_whitespace().count()))
    }
}

/// Token counter backed by a HF `tokenizers` definition.
#[cfg(feature = "hf-tokenizers")]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizers")]
impl HfTokenizer {
    /// Loads a `tokenizer.json` from disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            IngestError::Tokenizer(format!("failed to load {}: {e}", path.display()))
        })?;
        Ok(Self { inner })
    }

    /// Parses a `tokenizer.json` already held in memory.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self, IngestError> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| IngestError::Tokenizer(e.to_string()))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "hf-tokenizers")]
impl TokenCounter for HfTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize, IngestError> {
        // Special tokens are added by the service, not counted against the limit.
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| IngestError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().len())
    }
}

#[cfg(feature = "hf-tokenizers")]
impl fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HfTokenizer")
            .field("vocab_size", &self.inner.get_vocab_size(false))
            .finish()
    }
}

/// Model name to token counter lookup.
#[derive(Clone, Default)]
pub struct TokenizerRegistry {
    counters: HashMap<String, Arc<dyn TokenCounter>>,
    fallback: Option<Arc<dyn TokenCounter>>,
}

impl TokenizerRegistry {
    /// An empty registry without fallback. Every lookup fails until models are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry that answers unknown models with [`EstimatingTokenizer`].
    pub fn with_estimating_fallback() -> Self {
        Self {
            counters: HashMap::new(),
            fallback: Some(Arc::new(EstimatingTokenizer)),
        }
    }

    /// Registers `counter` for `model`, replacing any previous entry.
    pub fn register(
        &mut self,
        model: impl Into<String>,
        counter: Arc<dyn TokenCounter>,
    ) -> &mut Self {
        self.counters.insert(model.into(), counter);
        self
    }

    /// Sets the counter used for models without an explicit entry.
    pub fn set_fallback(&mut self, counter: Arc<dyn TokenCounter>) -> &mut Self {
        self.fallback = Some(counter);
        self
    }

    /// Resolves the counter for `model`. Falling back is logged as a warning.
    pub fn resolve(&self, model: &str) -> Result<Arc<dyn TokenCounter>, IngestError> {
        if let Some(counter) = self.counters.get(model) {
            return Ok(Arc::clone(counter));
        }
        match &self.fallback {
            Some(counter) => {
                warn!(model, "tokenizer_fallback");
                Ok(Arc::clone(counter))
            }
            None => Err(IngestError::UnknownModel(model.to_string())),
        }
    }

    /// Registered model names, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.counters.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }
}

impl fmt::Debug for TokenizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerRegistry")
            .field("models", &self.models())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCounter(usize);

    impl TokenCounter for FixedCounter {
        fn count_tokens(&self, _text: &str) -> Result<usize, IngestError> {
            Ok(self.0)
        }
    }

    #[test]
    fn whitespace_counts_words() {
        let tok = WhitespaceTokenizer;
        assert_eq!(tok.count_tokens("").unwrap(), 0);
        assert_eq!(tok.count_tokens("  one\ttwo\n three ").unwrap(), 3);
    }

    #[test]
    fn registered_model_wins_over_fallback() {
        let mut registry = TokenizerRegistry::with_estimating_fallback();
        registry.register("fixed", Arc::new(FixedCounter(42)));

        let fixed = registry.resolve("fixed").unwrap();
        assert_eq!(fixed.count_tokens("a b").unwrap(), 42);

        let fallback = registry.resolve("anything-else").unwrap();
        assert_eq!(fallback.count_tokens("a b").unwrap(), 2);
    }

    #[test]
    fn estimate_does_not_undercount_unbroken_text() {
        let tok = EstimatingTokenizer;
        assert_eq!(tok.count_tokens("").unwrap(), 0);
        assert_eq!(tok.count_tokens("a b c d").unwrap(), 4);
        assert_eq!(tok.count_tokens(&"x".repeat(30)).unwrap(), 10);
        assert_eq!(tok.count_tokens(&"文".repeat(20_000)).unwrap(), 20_000);
        assert_eq!(tok.count_tokens("日本 abc").unwrap(), 4);
    }

    #[test]
    fn unknown_model_without_fallback_fails() {
        let registry = TokenizerRegistry::new();
        let err = registry.resolve("text-embedding-ada-002").err().unwrap();
        assert_eq!(
            err,
            IngestError::UnknownModel("text-embedding-ada-002".into())
        );
    }

    #[test]
    fn models_are_listed_sorted() {
        let mut registry = TokenizerRegistry::new();
        registry
            .register("b", Arc::new(WhitespaceTokenizer))
            .register("a", Arc::new(WhitespaceTokenizer));
        assert_eq!(registry.models(), ["a", "b"]);
        assert!(format!("{registry:?}").contains("has_fallback: false"));
    }

    #[cfg(feature = "hf-tokenizers")]
    #[test]
    fn hf_tokenizer_rejects_garbage_definition() {
        let err = HfTokenizer::from_bytes(b"not a tokenizer").unwrap_err();
        assert!(matches!(err, IngestError::Tokenizer(_)));
    }
}
