//! # Conversational RAG Example
//!
//! Answers two turns of a conversation over a small in-memory corpus, with
//! every generation memoized in a slot cache.
//!
//! Uses `InMemoryIndex`, a keyword `KeywordEmbeddingProvider`, and an
//! `ExtractiveLlm` that quotes its prompt, so it runs with **zero API keys**.
//!
//! Run: `RUST_LOG=adk_chat_rag=debug cargo run --example conversational_rag`

use std::sync::Arc;

use adk_chat_rag::{
    CacheConfig, CachedLlm, ChainConfig, ConversationalRetrievalChain, Document,
    EmbeddingProvider, FromLlmOptions, Generation, InMemoryIndex, InMemoryKeyValueStore, Llm,
    RetrieverConfig, SimilarityIndex, SlotCache, Turn, VectorStoreRetriever,
};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// KeywordEmbeddingProvider — one dimension per vocabulary word
// ---------------------------------------------------------------------------

const VOCABULARY: &[&str] =
    &["rust", "memory", "ownership", "python", "data", "retrieval", "vector"];

struct KeywordEmbeddingProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for KeywordEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> adk_chat_rag::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(VOCABULARY.iter().map(|w| lower.matches(w).count() as f32).collect())
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len()
    }
}

// ---------------------------------------------------------------------------
// ExtractiveLlm — answers by quoting the prompt
// ---------------------------------------------------------------------------

/// Condense prompts get the follow-up input echoed back with the last human
/// turn as context; answer prompts get the first context paragraph.
struct ExtractiveLlm;

#[async_trait::async_trait]
impl Llm for ExtractiveLlm {
    fn model_key(&self) -> String {
        "extractive-v1".to_string()
    }

    async fn generate(&self, prompt: &str) -> adk_chat_rag::Result<Vec<Generation>> {
        let text = if let Some(follow_up) = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Follow Up Input: "))
        {
            let topic = prompt
                .lines()
                .filter_map(|l| l.strip_prefix("Human: "))
                .last()
                .unwrap_or_default();
            format!("{follow_up} (about: {topic})")
        } else {
            prompt.split("\n\n").nth(1).unwrap_or_default().to_string()
        };
        Ok(vec![Generation::new(text)])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // -- 1. Index a small corpus ------------------------------------------
    let index = Arc::new(InMemoryIndex::new(Arc::new(KeywordEmbeddingProvider)));
    index
        .add_documents(vec![
            Document::new(
                "Rust achieves memory safety without a garbage collector through ownership.",
            )
            .with_metadata("topic", "rust"),
            Document::new("Python is widely used for data science and automation.")
                .with_metadata("topic", "python"),
            Document::new(
                "Retrieval-augmented generation feeds vector search results to a language model.",
            )
            .with_metadata("topic", "rag"),
        ])
        .await?;
    let retriever = Arc::new(VectorStoreRetriever::new(index, RetrieverConfig::new(1)));

    // -- 2. Wrap the model with a generation cache -------------------------
    let store = Arc::new(InMemoryKeyValueStore::new());
    let cache = Arc::new(SlotCache::new(store.clone(), CacheConfig::default()));
    let llm = Arc::new(CachedLlm::new(Arc::new(ExtractiveLlm), cache));

    // -- 3. Build the chain ------------------------------------------------
    let options = FromLlmOptions {
        config: ChainConfig::builder().return_source_documents(true).build()?,
        ..FromLlmOptions::default()
    };
    let chain = ConversationalRetrievalChain::from_llm(llm, retriever, options)?;

    // -- 4. Ask a first question and a follow-up --------------------------
    let mut history: Vec<Turn> = Vec::new();
    for question in ["How does Rust handle memory?", "And what about ownership?"] {
        println!("\nQ: {question}");
        let result = chain.run(question, history.clone()).await?;
        let answer = result.output_str("text").unwrap_or_default().to_string();
        println!("A: {answer}");
        for doc in result.source_documents.unwrap_or_default() {
            let topic = doc.metadata.get("topic").map(|t| t.to_string()).unwrap_or_default();
            println!("   source [{topic}]: {}", doc.content);
        }
        history.push(Turn::human(question));
        history.push(Turn::assistant(answer));
    }

    // -- 5. Repeat the last turn; served from the cache --------------------
    let cached_slots = store.len().await;
    chain.run("And what about ownership?", history[..2].to_vec()).await?;
    tracing::info!(before = cached_slots, after = store.len().await, "cache slots after repeat");

    Ok(())
}
