//! Shared test doubles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use adk_chat_rag::{
    Chain, ChainValues, Document, EmbeddingProvider, Generation, KeyValueStore, Llm, RagError,
    Result, Retriever,
};
use async_trait::async_trait;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Embeds text as counts of a fixed vocabulary, so rankings are predictable.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self { vocabulary: vocabulary.to_vec(), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        Ok(self.vocabulary.iter().map(|w| lower.matches(w).count() as f32).collect())
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }
}

/// An embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding { provider: "failing".into(), message: "offline".into() })
    }

    fn dimensions(&self) -> usize {
        3
    }
}

/// Returns the same generations for every prompt and records prompts.
pub struct ScriptedLlm {
    model: String,
    outputs: Vec<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(model: &str, outputs: &[&str]) -> Self {
        Self {
            model: model.to_string(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    fn model_key(&self) -> String {
        self.model.clone()
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<Generation>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.outputs.iter().map(Generation::new).collect())
    }
}

/// An LLM that always fails.
pub struct FailingLlm;

#[async_trait]
impl Llm for FailingLlm {
    fn model_key(&self) -> String {
        "failing".to_string()
    }

    async fn generate(&self, _prompt: &str) -> Result<Vec<Generation>> {
        Err(RagError::Llm { model: "failing".into(), message: "rate limited".into() })
    }
}

/// Returns fixed outputs and records every input map.
pub struct ScriptedChain {
    outputs: ChainValues,
    pub inputs: Mutex<Vec<ChainValues>>,
}

impl ScriptedChain {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let outputs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        Self { outputs, inputs: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn last_input(&self) -> Option<ChainValues> {
        self.inputs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Chain for ScriptedChain {
    fn chain_type(&self) -> &str {
        "scripted"
    }

    fn input_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn output_keys(&self) -> Vec<String> {
        self.outputs.keys().cloned().collect()
    }

    async fn call(&self, inputs: ChainValues) -> Result<ChainValues> {
        self.inputs.lock().unwrap().push(inputs);
        Ok(self.outputs.clone())
    }
}

/// Returns fixed documents and records every query.
pub struct RecordingRetriever {
    documents: Vec<Document>,
    pub queries: Mutex<Vec<String>>,
}

impl RecordingRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents, queries: Mutex::new(Vec::new()) }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for RecordingRetriever {
    async fn get_relevant_documents(&self, query: &str) -> Result<Vec<Document>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.documents.clone())
    }
}

/// A key-value store that fails every `set` once `allowed_writes` have succeeded.
pub struct FlakyStore {
    inner: adk_chat_rag::InMemoryKeyValueStore,
    allowed_writes: usize,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(allowed_writes: usize) -> Self {
        Self {
            inner: adk_chat_rag::InMemoryKeyValueStore::new(),
            allowed_writes,
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    fn backend(&self) -> &str {
        "flaky"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.allowed_writes {
            return Err(RagError::Cache {
                backend: "flaky".into(),
                message: "connection reset".into(),
            });
        }
        self.inner.set(key, value).await
    }
}

/// Counts `WARN` events on the current thread while installed.
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Install a thread-local subscriber counting warnings until the guard drops.
pub fn count_warnings() -> (DefaultGuard, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
    (tracing::subscriber::set_default(subscriber), count)
}
