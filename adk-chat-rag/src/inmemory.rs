//! In-memory similarity index using cosine similarity.
//!
//! This module provides [`InMemoryIndex`], a dependency-free index backed by
//! a `Vec` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small corpora.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::{Document, ScoreOrder, ScoredDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::SimilarityIndex;

const BACKEND: &str = "InMemory";

/// Exact-match filter over document metadata.
///
/// A document matches when every configured key is present in its metadata
/// with an equal value. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    equals: HashMap<String, Value>,
}

impl MetadataFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if `document` satisfies every condition.
    pub fn matches(&self, document: &Document) -> bool {
        self.equals.iter().all(|(k, v)| document.metadata.get(k) == Some(v))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    vector: Vec<f32>,
    document: Document,
}

/// An in-memory similarity index ranking by cosine similarity.
///
/// Scores are similarities in `[-1, 1]`; higher is closer. Ties keep
/// insertion order.
///
/// # Example
///
/// ```rust,ignore
/// use adk_chat_rag::{InMemoryIndex, MetadataFilter, SimilarityIndex};
///
/// let index = InMemoryIndex::new(Arc::new(embedder));
/// index.add_documents(docs).await?;
/// let filter = MetadataFilter::new().eq("lang", "rust");
/// let hits = index.similarity_search("ownership", 3, Some(&filter)).await?;
/// ```
pub struct InMemoryIndex {
    embeddings: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryIndex {
    /// Create an empty index whose dimensionality is taken from `embeddings`.
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        let dimensions = embeddings.dimensions();
        Self { embeddings, dimensions, entries: RwLock::new(Vec::new()) }
    }

    /// Create an index pre-populated with `documents`.
    pub async fn from_documents(
        documents: Vec<Document>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let index = Self::new(embeddings);
        index.add_documents(documents).await?;
        Ok(index)
    }

    /// Create an index from raw texts, attaching `metadata` to each one.
    pub async fn from_texts(
        texts: Vec<String>,
        metadata: HashMap<String, Value>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let documents = texts
            .into_iter()
            .map(|content| Document { content, metadata: metadata.clone() })
            .collect();
        Self::from_documents(documents, embeddings).await
    }

    /// Vector length accepted by this index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Vectors must have the index's length and only finite components.
    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if !vector.iter().all(|x| x.is_finite()) {
            return Err(RagError::VectorStore {
                backend: BACKEND.to_string(),
                message: "vector contains non-finite components".to_string(),
            });
        }
        if vector.len() != self.dimensions {
            return Err(RagError::VectorStore {
                backend: BACKEND.to_string(),
                message: format!(
                    "vector has {} dimensions, index expects {}",
                    vector.len(),
                    self.dimensions
                ),
            });
        }
        Ok(())
    }
}

/// Descending by score; NaN (from overflowing norms) sorts last.
fn best_first(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    type Filter = MetadataFilter;

    fn index_type(&self) -> &str {
        "memory"
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::HigherIsCloser
    }

    fn embeddings(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embeddings
    }

    async fn add_vectors(
        &self,
        vectors: Vec<Vec<f32>>,
        documents: Vec<Document>,
    ) -> Result<Vec<String>> {
        if vectors.len() != documents.len() {
            return Err(RagError::VectorStore {
                backend: BACKEND.to_string(),
                message: format!(
                    "got {} vectors for {} documents",
                    vectors.len(),
                    documents.len()
                ),
            });
        }
        for vector in &vectors {
            self.check_vector(vector)?;
        }

        let mut entries = self.entries.write().await;
        let mut ids = Vec::with_capacity(documents.len());
        for (vector, document) in vectors.into_iter().zip(documents) {
            let id = Uuid::new_v4().to_string();
            ids.push(id.clone());
            entries.push(Entry { id, vector, document });
        }
        Ok(ids)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| !ids.contains(&e.id));
        Ok(())
    }

    async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        self.check_vector(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredDocument> = entries
            .iter()
            .filter(|e| filter.is_none_or(|f| f.matches(&e.document)))
            .map(|e| ScoredDocument {
                document: e.document.clone(),
                score: cosine_similarity(&e.vector, vector),
            })
            .collect();

        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| best_first(a.score, b.score));
        scored.truncate(k);
        Ok(scored)
    }
}
