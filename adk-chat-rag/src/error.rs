//! Error types for the `adk-chat-rag` crate.

use std::fmt;

use thiserror::Error;

/// The pipeline stage an error or log event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Required input keys are checked.
    Validate,
    /// The supplied history is converted into a transcript.
    NormalizeHistory,
    /// The follow-up question is rewritten into a standalone question.
    CondenseQuestion,
    /// Documents are fetched for the standalone question.
    Retrieve,
    /// The final answer is produced from the retrieved documents.
    Synthesize,
    /// Source documents are merged into the result.
    Finalize,
}

impl Stage {
    /// Stable lowercase name used in log fields and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::NormalizeHistory => "normalize_history",
            Stage::CondenseQuestion => "condense_question",
            Stage::Retrieve => "retrieve",
            Stage::Synthesize => "synthesize",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while answering a conversational query.
#[derive(Debug, Error)]
pub enum RagError {
    /// A required key was absent from the invocation input.
    #[error("Missing input key '{key}'")]
    MissingInput {
        /// The key that was expected.
        key: String,
    },

    /// A sub-chain expected to produce a single field produced several.
    #[error("Ambiguous output from {stage}: expected exactly one field, got {keys:?}")]
    AmbiguousOutput {
        /// The stage whose sub-chain returned the output.
        stage: Stage,
        /// The output keys that were returned.
        keys: Vec<String>,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the similarity index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model call failed.
    #[error("LLM error ({model}): {message}")]
    Llm {
        /// The model identifier that was invoked.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation cache backing store failed.
    #[error("Cache error ({backend}): {message}")]
    Cache {
        /// The backing store that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The requested operation is not supported.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The invocation input was present but malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    /// Returns `true` for failures raised by an external collaborator: the
    /// LLM, the embedding function, the similarity index or the cache store.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RagError::Embedding { .. }
                | RagError::VectorStore { .. }
                | RagError::Llm { .. }
                | RagError::Cache { .. }
        )
    }
}

/// A convenience result type for conversational retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
