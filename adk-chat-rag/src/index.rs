//! The similarity-search contract every vector index satisfies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::{Document, ScoreOrder, ScoredDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Nearest-neighbour search over a fixed-dimension vector space.
///
/// Implementations must:
///
/// - return at most `k` results, ordered best-to-worst according to
///   [`score_order`](SimilarityIndex::score_order)
/// - return an empty list for `k == 0` and every match when `k` exceeds the
///   corpus size, without erroring
/// - only return documents that satisfy the supplied filter
/// - be safe to query concurrently through a shared reference
///
/// The filter type is opaque to callers and interpreted only by the index.
///
/// # Example
///
/// ```rust,ignore
/// use adk_chat_rag::{Document, InMemoryIndex, SimilarityIndex};
///
/// let index = InMemoryIndex::new(embedder);
/// index.add_documents(vec![Document::new("Rust has no garbage collector")]).await?;
/// let docs = index.similarity_search("memory management", 4, None).await?;
/// ```
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Backend-specific filter understood by this index.
    type Filter: Send + Sync;

    /// Short backend name used in logs and errors.
    fn index_type(&self) -> &str;

    /// How scores returned by this index should be read.
    fn score_order(&self) -> ScoreOrder;

    /// The embedding function used to embed documents and queries.
    fn embeddings(&self) -> &Arc<dyn EmbeddingProvider>;

    /// Store pre-computed vectors alongside their documents.
    ///
    /// Returns the generated identifiers in input order.
    async fn add_vectors(
        &self,
        vectors: Vec<Vec<f32>>,
        documents: Vec<Document>,
    ) -> Result<Vec<String>>;

    /// Embed documents and store them.
    ///
    /// Embedding failures abort the whole call; nothing is stored.
    async fn add_documents(&self, documents: Vec<Document>) -> Result<Vec<String>> {
        let vectors = {
            let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
            self.embeddings().embed_documents(&texts).await?
        };
        self.add_vectors(vectors, documents).await
    }

    /// Remove documents by identifier.
    ///
    /// Indexes that do not support deletion keep this default, which fails
    /// with [`RagError::NotImplemented`].
    async fn delete(&self, _ids: &[String]) -> Result<()> {
        Err(RagError::NotImplemented(format!(
            "delete is not supported by the {} index",
            self.index_type()
        )))
    }

    /// Rank stored vectors by closeness to `vector`.
    async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Self::Filter>,
    ) -> Result<Vec<ScoredDocument>>;

    /// Embed `query` and rank stored vectors against it, keeping scores.
    ///
    /// The query is embedded even when `k == 0`.
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Self::Filter>,
    ) -> Result<Vec<ScoredDocument>> {
        let vector = self.embeddings().embed_query(query).await?;
        let results = self.similarity_search_by_vector(&vector, k, filter).await?;
        debug!(index = self.index_type(), k, result_count = results.len(), "similarity search");
        Ok(results)
    }

    /// Embed `query` and return the `k` closest documents without scores.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Self::Filter>,
    ) -> Result<Vec<Document>> {
        let results = self.similarity_search_with_score(query, k, filter).await?;
        Ok(results.into_iter().map(|r| r.document).collect())
    }
}
