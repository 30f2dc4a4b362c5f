//! Embedding function consumed by similarity indexes.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into fixed-length vectors.
///
/// This crate only consumes embeddings; backends (OpenAI, local models, ...)
/// implement this trait. Every vector returned by one provider must have
/// [`dimensions`](EmbeddingProvider::dimensions) entries.
///
/// # Example
///
/// ```rust,ignore
/// use adk_chat_rag::EmbeddingProvider;
///
/// let vector = provider.embed_query("what is a borrow checker?").await?;
/// assert_eq!(vector.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed documents for indexing.
    ///
    /// The default implementation embeds each text with
    /// [`embed_query`](EmbeddingProvider::embed_query) in order and fails on
    /// the first error. Backends with native batching should override it.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_query(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider produces.
    fn dimensions(&self) -> usize;
}
