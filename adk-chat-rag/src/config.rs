//! Configuration for retrievers, the generation cache, and the
//! conversational retrieval chain.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default number of documents a retriever returns.
pub const DEFAULT_K: usize = 4;

/// Default upper bound on cache slots scanned for one prompt/model pair.
pub const DEFAULT_MAX_GENERATIONS: usize = 64;

/// Default namespace prepended to every cache key.
pub const DEFAULT_KEY_PREFIX: &str = "adk:llm-cache";

/// Configuration for a [`VectorStoreRetriever`](crate::VectorStoreRetriever).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrieverConfig {
    /// Number of documents to fetch per query. Zero is allowed and yields
    /// an empty result.
    pub k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { k: DEFAULT_K }
    }
}

impl RetrieverConfig {
    /// Create a config that fetches `k` documents.
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

/// Configuration for a [`SlotCache`](crate::SlotCache).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of consecutive slots read by a single lookup.
    pub max_generations: usize,
    /// Namespace prepended to every key written to the backing store.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_generations: DEFAULT_MAX_GENERATIONS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for constructing a [`CacheConfig`].
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`CacheConfig`].
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set the maximum number of slots scanned per lookup.
    pub fn max_generations(mut self, max: usize) -> Self {
        self.config.max_generations = max;
        self
    }

    /// Set the key namespace.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Build the [`CacheConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `max_generations == 0`.
    pub fn build(self) -> Result<CacheConfig> {
        if self.config.max_generations == 0 {
            return Err(RagError::Config(
                "max_generations must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for a [`ConversationalRetrievalChain`](crate::ConversationalRetrievalChain).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainConfig {
    /// Input key holding the follow-up question.
    pub input_key: String,
    /// Input key holding the conversation history.
    pub chat_history_key: String,
    /// Whether retrieved documents are merged into the result.
    pub return_source_documents: bool,
    /// Output key used for the source documents.
    pub source_documents_key: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            input_key: "question".to_string(),
            chat_history_key: "chat_history".to_string(),
            return_source_documents: false,
            source_documents_key: "sourceDocuments".to_string(),
        }
    }
}

impl ChainConfig {
    /// Create a new builder for constructing a [`ChainConfig`].
    pub fn builder() -> ChainConfigBuilder {
        ChainConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`ChainConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChainConfigBuilder {
    config: ChainConfig,
}

impl ChainConfigBuilder {
    /// Set the question input key.
    pub fn input_key(mut self, key: impl Into<String>) -> Self {
        self.config.input_key = key.into();
        self
    }

    /// Set the chat history input key.
    pub fn chat_history_key(mut self, key: impl Into<String>) -> Self {
        self.config.chat_history_key = key.into();
        self
    }

    /// Enable or disable returning the retrieved documents.
    pub fn return_source_documents(mut self, enabled: bool) -> Self {
        self.config.return_source_documents = enabled;
        self
    }

    /// Set the output key used for source documents.
    pub fn source_documents_key(mut self, key: impl Into<String>) -> Self {
        self.config.source_documents_key = key.into();
        self
    }

    /// Build the [`ChainConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - any key is empty
    /// - `input_key == chat_history_key`
    pub fn build(self) -> Result<ChainConfig> {
        let c = &self.config;
        for (name, value) in [
            ("input_key", &c.input_key),
            ("chat_history_key", &c.chat_history_key),
            ("source_documents_key", &c.source_documents_key),
        ] {
            if value.is_empty() {
                return Err(RagError::Config(format!("{name} must not be empty")));
            }
        }
        if c.input_key == c.chat_history_key {
            return Err(RagError::Config(format!(
                "input_key and chat_history_key must differ (both '{}')",
                c.input_key
            )));
        }
        Ok(self.config)
    }
}
