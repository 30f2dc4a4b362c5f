//! Generation cache: memoizes LLM outputs per (prompt, model) pair.
//!
//! Each generation is stored in its own slot of a string key-value store,
//! addressed by [`cache_key`]. Slots for one pair form a run starting at
//! index 0; a lookup reads slots in order and stops at the first missing
//! one, so a pair whose slot 0 is absent is a miss even if later slots exist.
//!
//! Neither [`GenerationCache::lookup`] nor [`GenerationCache::update`] is
//! atomic. An update that fails part-way leaves the earlier slots written,
//! and concurrent updates of the same pair race slot by slot (last writer
//! wins). Updates never delete slots beyond the new run's length.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::llm::Generation;

/// Derive the storage key for one generation slot.
///
/// The prompt and model identifier are hashed together (length-prefixed so
/// that different splits never hash alike) and the slot index is appended
/// in decimal, so distinct indices of one pair never collide.
pub fn cache_key(prefix: &str, prompt: &str, llm_key: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update((prompt.len() as u64).to_le_bytes());
    hasher.update(prompt.as_bytes());
    hasher.update(llm_key.as_bytes());
    format!("{prefix}:{:x}:{index}", hasher.finalize())
}

/// A durable string-to-string map backing a [`SlotCache`].
///
/// No batching or transactions are assumed: every slot is a separate call.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &str;

    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// A [`KeyValueStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `key`, returning its previous value.
    pub async fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().await.remove(key)
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Maps a (prompt, model identifier) pair to an ordered list of generations.
#[async_trait]
pub trait GenerationCache: Send + Sync {
    /// Return the cached generations, or `None` on a miss.
    ///
    /// A returned list is never empty.
    async fn lookup(&self, prompt: &str, llm_key: &str) -> Result<Option<Vec<Generation>>>;

    /// Store `generations` at slots `0..generations.len()`.
    async fn update(&self, prompt: &str, llm_key: &str, generations: &[Generation]) -> Result<()>;
}

/// A [`GenerationCache`] storing one generation per key-value slot.
///
/// Only generation text is persisted; `info` is dropped on write.
///
/// # Example
///
/// ```rust,ignore
/// use adk_chat_rag::{CacheConfig, GenerationCache, InMemoryKeyValueStore, SlotCache};
///
/// let cache = SlotCache::new(Arc::new(InMemoryKeyValueStore::new()), CacheConfig::default());
/// cache.update("prompt", "gpt-4o-mini", &[Generation::new("hi")]).await?;
/// assert!(cache.lookup("prompt", "gpt-4o-mini").await?.is_some());
/// ```
pub struct SlotCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl SlotCache {
    /// Create a cache over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Storage key of slot `index` for the given pair.
    pub fn slot_key(&self, prompt: &str, llm_key: &str, index: usize) -> String {
        cache_key(&self.config.key_prefix, prompt, llm_key, index)
    }
}

#[async_trait]
impl GenerationCache for SlotCache {
    async fn lookup(&self, prompt: &str, llm_key: &str) -> Result<Option<Vec<Generation>>> {
        let mut generations = Vec::new();
        for index in 0..self.config.max_generations {
            let key = self.slot_key(prompt, llm_key, index);
            match self.store.get(&key).await? {
                Some(text) => generations.push(Generation::new(text)),
                None => break,
            }
        }

        if generations.len() == self.config.max_generations {
            let next = self.slot_key(prompt, llm_key, self.config.max_generations);
            if self.store.get(&next).await?.is_some() {
                warn!(
                    backend = self.store.backend(),
                    llm_key,
                    max_generations = self.config.max_generations,
                    "cached run is longer than max_generations; extra slots ignored"
                );
            }
        }

        debug!(
            backend = self.store.backend(),
            llm_key,
            slots = generations.len(),
            hit = !generations.is_empty(),
            "cache lookup"
        );

        Ok(if generations.is_empty() { None } else { Some(generations) })
    }

    async fn update(&self, prompt: &str, llm_key: &str, generations: &[Generation]) -> Result<()> {
        if generations.len() > self.config.max_generations {
            warn!(
                backend = self.store.backend(),
                llm_key,
                count = generations.len(),
                max_generations = self.config.max_generations,
                "writing more generations than a lookup will read back"
            );
        }
        for (index, generation) in generations.iter().enumerate() {
            let key = self.slot_key(prompt, llm_key, index);
            self.store.set(&key, &generation.text).await?;
        }
        debug!(backend = self.store.backend(), llm_key, slots = generations.len(), "cache update");
        Ok(())
    }
}
