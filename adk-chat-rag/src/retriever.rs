//! Retrievers turn a text query into ranked documents.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RetrieverConfig;
use crate::document::Document;
use crate::error::Result;
use crate::index::SimilarityIndex;

/// Fetches the documents most relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return documents ordered best-to-worst.
    async fn get_relevant_documents(&self, query: &str) -> Result<Vec<Document>>;
}

/// A [`Retriever`] backed by a [`SimilarityIndex`].
///
/// Each call is forwarded to [`SimilarityIndex::similarity_search`] with the
/// configured `k` and persistent filter. Nothing is memoized here.
///
/// # Example
///
/// ```rust,ignore
/// use adk_chat_rag::{RetrieverConfig, VectorStoreRetriever};
///
/// let retriever = VectorStoreRetriever::new(Arc::new(index), RetrieverConfig::new(3))
///     .with_filter(MetadataFilter::new().eq("source", "handbook"));
/// let docs = retriever.get_relevant_documents("vacation policy").await?;
/// ```
pub struct VectorStoreRetriever<I: SimilarityIndex> {
    index: Arc<I>,
    config: RetrieverConfig,
    filter: Option<I::Filter>,
}

impl<I: SimilarityIndex> VectorStoreRetriever<I> {
    /// Wrap `index` with the given configuration and no filter.
    pub fn new(index: Arc<I>, config: RetrieverConfig) -> Self {
        Self { index, config, filter: None }
    }

    /// Apply `filter` to every query issued by this retriever.
    pub fn with_filter(mut self, filter: I::Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// The underlying index.
    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    /// Number of documents fetched per query.
    pub fn k(&self) -> usize {
        self.config.k
    }

    /// Embed and store documents in the underlying index.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<Vec<String>> {
        self.index.add_documents(documents).await
    }
}

#[async_trait]
impl<I: SimilarityIndex> Retriever for VectorStoreRetriever<I> {
    async fn get_relevant_documents(&self, query: &str) -> Result<Vec<Document>> {
        self.index.similarity_search(query, self.config.k, self.filter.as_ref()).await
    }
}
