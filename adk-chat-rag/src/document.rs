//! Data types for documents and scored search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit of retrievable text with arbitrary metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Document {
    /// The text content of the document.
    #[serde(rename = "pageContent")]
    pub content: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: HashMap::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A [`Document`] paired with the score assigned by a similarity index.
///
/// Whether a larger score means "closer" is decided by the index; see
/// [`SimilarityIndex::score_order`](crate::SimilarityIndex::score_order).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredDocument {
    /// The retrieved document.
    pub document: Document,
    /// The distance or similarity score.
    pub score: f32,
}

/// Ordering convention of the scores returned by a similarity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreOrder {
    /// Scores are similarities; larger values rank first.
    HigherIsCloser,
    /// Scores are distances; smaller values rank first.
    LowerIsCloser,
}

impl ScoreOrder {
    /// Returns `true` if `a` ranks at least as well as `b` under this convention.
    pub fn ranks_before(&self, a: f32, b: f32) -> bool {
        match self {
            ScoreOrder::HigherIsCloser => a >= b,
            ScoreOrder::LowerIsCloser => a <= b,
        }
    }
}
