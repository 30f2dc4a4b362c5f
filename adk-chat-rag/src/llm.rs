//! Language-model boundary and the caching wrapper around it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::GenerationCache;
use crate::error::Result;

/// One sampled output of a language-model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// The generated text.
    pub text: String,
    /// Provider-specific details (finish reason, token usage, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Map<String, Value>>,
}

impl Generation {
    /// A generation with text only.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), info: None }
    }

    /// Attach provider details.
    pub fn with_info(mut self, info: Map<String, Value>) -> Self {
        self.info = Some(info);
        self
    }
}

/// A prompt-in, generations-out language model.
///
/// One call may return several samples; their order is significant.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Identifier of the model and any sampling parameters that change its
    /// output. Used as part of the generation cache key.
    fn model_key(&self) -> String;

    /// Generate completions for a fully rendered prompt.
    async fn generate(&self, prompt: &str) -> Result<Vec<Generation>>;
}

/// An [`Llm`] that consults a [`GenerationCache`] before calling the model.
///
/// On a hit the cached generations are returned without calling the inner
/// model. On a miss the model is called and its output written back.
/// Cache and model errors propagate unchanged.
///
/// # Example
///
/// ```rust,ignore
/// let store = Arc::new(InMemoryKeyValueStore::new());
/// let cache = Arc::new(SlotCache::new(store, CacheConfig::default()));
/// let llm = CachedLlm::new(Arc::new(model), cache);
/// let first = llm.generate("2 + 2 =").await?;  // calls the model
/// let second = llm.generate("2 + 2 =").await?; // served from the cache
/// ```
pub struct CachedLlm {
    inner: Arc<dyn Llm>,
    cache: Arc<dyn GenerationCache>,
}

impl CachedLlm {
    /// Wrap `inner` with `cache`.
    pub fn new(inner: Arc<dyn Llm>, cache: Arc<dyn GenerationCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Llm for CachedLlm {
    fn model_key(&self) -> String {
        self.inner.model_key()
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<Generation>> {
        let llm_key = self.inner.model_key();
        if let Some(cached) = self.cache.lookup(prompt, &llm_key).await? {
            debug!(llm_key = %llm_key, generations = cached.len(), "served from generation cache");
            return Ok(cached);
        }

        let generations = self.inner.generate(prompt).await?;
        if !generations.is_empty() {
            self.cache.update(prompt, &llm_key, &generations).await?;
        }
        Ok(generations)
    }
}
