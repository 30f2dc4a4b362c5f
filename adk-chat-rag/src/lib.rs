//! # adk-chat-rag
//!
//! Conversational retrieval-augmented answering for ADK-Rust.
//!
//! ## Overview
//!
//! Given a follow-up question and the conversation so far, the
//! [`ConversationalRetrievalChain`]:
//!
//! 1. normalizes the history into a transcript ([`ChatHistory`])
//! 2. rewrites the question into a standalone query (skipped on the first turn)
//! 3. retrieves documents through a [`Retriever`] over a [`SimilarityIndex`]
//! 4. synthesizes the answer from those documents
//!
//! Generation calls can be memoized with a [`GenerationCache`]: wrap any
//! [`Llm`] in a [`CachedLlm`] backed by a [`SlotCache`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_chat_rag::{
//!     CacheConfig, CachedLlm, ConversationalRetrievalChain, Document, FromLlmOptions,
//!     InMemoryIndex, InMemoryKeyValueStore, RetrieverConfig, SimilarityIndex, SlotCache,
//!     Turn, VectorStoreRetriever,
//! };
//!
//! let index = Arc::new(InMemoryIndex::new(Arc::new(embedder)));
//! index.add_documents(vec![Document::new("Rust 1.0 shipped in May 2015.")]).await?;
//! let retriever = Arc::new(VectorStoreRetriever::new(index, RetrieverConfig::default()));
//!
//! let store = Arc::new(InMemoryKeyValueStore::new());
//! let cache = Arc::new(SlotCache::new(store, CacheConfig::default()));
//! let llm = Arc::new(CachedLlm::new(Arc::new(model), cache));
//!
//! let chain = ConversationalRetrievalChain::from_llm(llm, retriever, FromLlmOptions::default())?;
//! let history = vec![Turn::human("Tell me about Rust"), Turn::assistant("It is a language.")];
//! let result = chain.run("When was 1.0?", history).await?;
//! ```
//!
//! ## Features
//!
//! - `openai` – OpenAI embeddings and chat-completion providers
//! - `redis` – Redis backing store for the generation cache
//! - `full` – everything above

pub mod cache;
pub mod chain;
pub mod config;
pub mod conversational;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod inmemory;
pub mod llm;
pub mod message;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompt;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod retriever;

pub use cache::{GenerationCache, InMemoryKeyValueStore, KeyValueStore, SlotCache, cache_key};
pub use chain::{Chain, ChainValues, LlmChain, StuffDocumentsChain};
pub use config::{
    CacheConfig, CacheConfigBuilder, ChainConfig, ChainConfigBuilder, RetrieverConfig,
};
pub use conversational::{
    ConversationalRetrievalChain, ConversationalRetrievalChainBuilder, FromLlmOptions,
    PipelineResult,
};
pub use document::{Document, ScoreOrder, ScoredDocument};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result, Stage};
pub use index::SimilarityIndex;
pub use inmemory::{InMemoryIndex, MetadataFilter};
pub use llm::{CachedLlm, Generation, Llm};
pub use message::{ChatHistory, Conversation, Role, Turn};
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatLlm, OpenAIEmbeddingProvider};
pub use prompt::{CONDENSE_QUESTION_TEMPLATE, PromptTemplate, QA_TEMPLATE};
#[cfg(feature = "redis")]
pub use redis_store::RedisKeyValueStore;
pub use retriever::{Retriever, VectorStoreRetriever};
