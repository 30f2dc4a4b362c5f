//! Tests for the in-memory similarity index and the vector-store retriever.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use adk_chat_rag::{
    Document, EmbeddingProvider, InMemoryIndex, MetadataFilter, RagError, Retriever,
    RetrieverConfig, ScoreOrder, SimilarityIndex, VectorStoreRetriever,
};
use common::{FailingEmbedder, KeywordEmbedder};
use proptest::prelude::*;

const VOCABULARY: &[&str] = &["rust", "python", "memory", "speed"];

async fn seeded_index() -> (Arc<KeywordEmbedder>, Arc<InMemoryIndex>) {
    let embedder = Arc::new(KeywordEmbedder::new(VOCABULARY));
    let index = Arc::new(InMemoryIndex::new(embedder.clone()));
    index
        .add_documents(vec![
            Document::new("rust rust memory").with_metadata("lang", "rust"),
            Document::new("python python").with_metadata("lang", "python"),
            Document::new("rust speed speed").with_metadata("lang", "rust"),
        ])
        .await
        .unwrap();
    (embedder, index)
}

#[tokio::test]
async fn search_ranks_closest_first() {
    let (_, index) = seeded_index().await;
    assert_eq!(index.score_order(), ScoreOrder::HigherIsCloser);

    let results = index.similarity_search_with_score("python", 3, None).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].document.content, "python python");
    for pair in results.windows(2) {
        assert!(index.score_order().ranks_before(pair[0].score, pair[1].score));
    }
}

#[tokio::test]
async fn k_zero_returns_nothing_but_still_embeds() {
    let (embedder, index) = seeded_index().await;
    let before = embedder.calls();

    let docs = index.similarity_search("rust", 0, None).await.unwrap();
    assert!(docs.is_empty());
    assert_eq!(embedder.calls(), before + 1);
}

#[tokio::test]
async fn k_larger_than_corpus_returns_everything() {
    let (_, index) = seeded_index().await;
    let docs = index.similarity_search("rust", 50, None).await.unwrap();
    assert_eq!(docs.len(), 3);
}

#[tokio::test]
async fn filter_restricts_results() {
    let (_, index) = seeded_index().await;
    let filter = MetadataFilter::new().eq("lang", "rust");
    let docs = index.similarity_search("python", 10, Some(&filter)).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| filter.matches(d)));
}

#[tokio::test]
async fn embedding_failure_propagates() {
    let index = InMemoryIndex::new(Arc::new(FailingEmbedder));
    let err = index.similarity_search("anything", 4, None).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { .. }));

    let err = index.add_documents(vec![Document::new("text")]).await.unwrap_err();
    assert!(err.is_upstream());
    assert!(index.is_empty().await);
}

#[tokio::test]
async fn wrong_vector_length_is_rejected() {
    let (_, index) = seeded_index().await;
    let err = index.similarity_search_by_vector(&[1.0, 0.0], 2, None).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));

    let err = index
        .add_vectors(vec![vec![1.0; VOCABULARY.len()]], vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
}

#[tokio::test]
async fn non_finite_vectors_are_rejected() {
    let index = InMemoryIndex::new(Arc::new(KeywordEmbedder::new(&["a", "b"])));
    let err = index
        .add_vectors(vec![vec![f32::NAN, 1.0]], vec![Document::new("nan")])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
    let err = index
        .add_vectors(vec![vec![f32::INFINITY, 1.0]], vec![Document::new("inf")])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
    assert!(index.is_empty().await);

    let err = index.similarity_search_by_vector(&[f32::NAN, 0.5], 4, None).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
}

#[tokio::test]
async fn overflowing_scores_rank_last() {
    let index = InMemoryIndex::new(Arc::new(KeywordEmbedder::new(&["a", "b"])));
    let (vectors, documents): (Vec<_>, Vec<_>) = (0..40)
        .map(|i| {
            // finite, but the norm overflows to infinity and the score is NaN
            let vector =
                if i % 3 == 0 { vec![f32::MAX, f32::MAX] } else { vec![1.0, i as f32 * 0.05] };
            (vector, Document::new(i.to_string()))
        })
        .unzip();
    index.add_vectors(vectors, documents).await.unwrap();

    let results = index.similarity_search_by_vector(&[1.0, 0.5], 40, None).await.unwrap();
    assert_eq!(results.len(), 40);
    let finite = results.iter().take_while(|r| !r.score.is_nan()).count();
    assert_eq!(finite, 26);
    assert!(results[finite..].iter().all(|r| r.score.is_nan()));
    for pair in results[..finite].windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let best = index.similarity_search_by_vector(&[1.0, 0.5], 1, None).await.unwrap();
    assert_eq!(best[0].document.content, "10");
}

#[tokio::test]
async fn delete_removes_documents() {
    let embedder = Arc::new(KeywordEmbedder::new(VOCABULARY));
    let index = InMemoryIndex::new(embedder);
    let ids = index
        .add_documents(vec![Document::new("rust"), Document::new("python")])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    index.delete(&ids[..1]).await.unwrap();
    assert_eq!(index.len().await, 1);
    let docs = index.similarity_search("rust", 4, None).await.unwrap();
    assert_eq!(docs, vec![Document::new("python")]);
}

#[tokio::test]
async fn from_texts_attaches_metadata() {
    let embedder = Arc::new(KeywordEmbedder::new(VOCABULARY));
    let metadata = HashMap::from([("source".to_string(), serde_json::json!("faq"))]);
    let index = InMemoryIndex::from_texts(vec!["rust".into(), "speed".into()], metadata, embedder)
        .await
        .unwrap();
    let docs = index.similarity_search("speed", 1, None).await.unwrap();
    assert_eq!(docs[0].content, "speed");
    assert_eq!(docs[0].metadata["source"], "faq");
}

#[tokio::test]
async fn retriever_forwards_k_and_filter() {
    let (embedder, index) = seeded_index().await;
    let retriever = VectorStoreRetriever::new(index, RetrieverConfig::new(1))
        .with_filter(MetadataFilter::new().eq("lang", "rust"));
    assert_eq!(retriever.k(), 1);

    let before = embedder.calls();
    let docs = retriever.get_relevant_documents("speed").await.unwrap();
    assert_eq!(docs, vec![Document::new("rust speed speed").with_metadata("lang", "rust")]);

    // no memoization: the same query embeds again
    retriever.get_relevant_documents("speed").await.unwrap();
    assert_eq!(embedder.calls(), before + 2);
}

#[tokio::test]
async fn retriever_defaults_to_four_documents() {
    let embedder = Arc::new(KeywordEmbedder::new(VOCABULARY));
    let index = Arc::new(InMemoryIndex::new(embedder.clone()));
    let retriever = VectorStoreRetriever::new(index, RetrieverConfig::default());
    let docs: Vec<Document> = (0..6).map(|i| Document::new(format!("rust {i}"))).collect();
    retriever.add_documents(docs).await.unwrap();

    assert_eq!(retriever.get_relevant_documents("rust").await.unwrap().len(), 4);
    assert_eq!(embedder.dimensions(), VOCABULARY.len());
}

/// Generate a non-zero vector of the given dimension.
fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter("non-zero vector", |v| {
        v.iter().map(|x| x * x).sum::<f32>().sqrt() > 1e-6
    })
}

/// Results come back in descending score order and never exceed `k`.
mod prop_inmemory_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            vectors in proptest::collection::vec(arb_vector(VOCABULARY.len()), 1..20),
            query in arb_vector(VOCABULARY.len()),
            k in 0usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let count = vectors.len();
            let results = rt.block_on(async {
                let index = InMemoryIndex::new(Arc::new(KeywordEmbedder::new(VOCABULARY)));
                let documents = (0..count).map(|i| Document::new(format!("doc {i}"))).collect();
                index.add_vectors(vectors, documents).await.unwrap();
                index.similarity_search_by_vector(&query, k, None).await.unwrap()
            });

            prop_assert_eq!(results.len(), k.min(count));
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
