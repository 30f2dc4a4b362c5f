//! Chains: named-input, named-output async steps.
//!
//! A [`Chain`] maps a JSON object of inputs to a JSON object of outputs.
//! The conversational pipeline drives two of them: a question condenser
//! (usually an [`LlmChain`]) and an answer synthesizer (usually a
//! [`StuffDocumentsChain`]).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::llm::Llm;
use crate::prompt::PromptTemplate;

/// Named values passed into and out of a chain.
pub type ChainValues = Map<String, Value>;

/// An async step with named inputs and outputs.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Short identifier of the chain kind.
    fn chain_type(&self) -> &str;

    /// Keys this chain reads from its inputs.
    fn input_keys(&self) -> Vec<String>;

    /// Keys this chain writes to its outputs.
    fn output_keys(&self) -> Vec<String>;

    /// Run the chain.
    async fn call(&self, inputs: ChainValues) -> Result<ChainValues>;

    /// Serialize the chain configuration.
    ///
    /// Unsupported unless a chain overrides it.
    fn serialize(&self) -> Result<Value> {
        Err(RagError::NotImplemented(format!("serializing a {} chain", self.chain_type())))
    }
}

/// Renders a prompt from its inputs and returns the first generation.
pub struct LlmChain {
    prompt: PromptTemplate,
    llm: Arc<dyn Llm>,
    output_key: String,
}

impl LlmChain {
    /// Create a chain writing its result under `"text"`.
    pub fn new(prompt: PromptTemplate, llm: Arc<dyn Llm>) -> Self {
        Self { prompt, llm, output_key: "text".to_string() }
    }

    /// Write the result under `key` instead.
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// The prompt template.
    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }
}

#[async_trait]
impl Chain for LlmChain {
    fn chain_type(&self) -> &str {
        "llm_chain"
    }

    fn input_keys(&self) -> Vec<String> {
        self.prompt.input_variables().to_vec()
    }

    fn output_keys(&self) -> Vec<String> {
        vec![self.output_key.clone()]
    }

    async fn call(&self, inputs: ChainValues) -> Result<ChainValues> {
        let prompt = self.prompt.format(&inputs)?;
        let generations = self.llm.generate(&prompt).await?;
        let first = generations.into_iter().next().ok_or_else(|| RagError::Llm {
            model: self.llm.model_key(),
            message: "model returned no generations".to_string(),
        })?;

        let mut outputs = ChainValues::new();
        outputs.insert(self.output_key.clone(), Value::String(first.text));
        Ok(outputs)
    }
}

/// Stuffs every input document into one prompt variable and calls an
/// [`LlmChain`].
///
/// Reads documents from `"input_documents"`, joins their contents with a
/// blank line, and passes the result as `"context"` together with the
/// remaining inputs.
pub struct StuffDocumentsChain {
    llm_chain: LlmChain,
    input_key: String,
    document_variable_name: String,
    separator: String,
}

impl StuffDocumentsChain {
    /// Wrap `llm_chain`, whose prompt should reference `{context}`.
    pub fn new(llm_chain: LlmChain) -> Self {
        Self {
            llm_chain,
            input_key: "input_documents".to_string(),
            document_variable_name: "context".to_string(),
            separator: "\n\n".to_string(),
        }
    }

    /// Use `name` as the prompt variable receiving the joined documents.
    pub fn with_document_variable_name(mut self, name: impl Into<String>) -> Self {
        self.document_variable_name = name.into();
        self
    }

    /// Join documents with `separator`.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Join document contents the way they are inserted into the prompt.
    pub fn combine_documents(&self, documents: &[Document]) -> String {
        documents.iter().map(|d| d.content.as_str()).collect::<Vec<_>>().join(&self.separator)
    }
}

#[async_trait]
impl Chain for StuffDocumentsChain {
    fn chain_type(&self) -> &str {
        "stuff_documents_chain"
    }

    fn input_keys(&self) -> Vec<String> {
        let mut keys = vec![self.input_key.clone()];
        keys.extend(
            self.llm_chain
                .input_keys()
                .into_iter()
                .filter(|k| *k != self.document_variable_name && *k != self.input_key),
        );
        keys
    }

    fn output_keys(&self) -> Vec<String> {
        self.llm_chain.output_keys()
    }

    async fn call(&self, mut inputs: ChainValues) -> Result<ChainValues> {
        let raw = inputs
            .remove(&self.input_key)
            .ok_or_else(|| RagError::MissingInput { key: self.input_key.clone() })?;
        let documents: Vec<Document> = serde_json::from_value(raw).map_err(|e| {
            RagError::InvalidInput(format!("'{}' is not a list of documents: {e}", self.input_key))
        })?;

        debug!(document_count = documents.len(), "stuffing documents into prompt");
        inputs.insert(
            self.document_variable_name.clone(),
            Value::String(self.combine_documents(&documents)),
        );
        self.llm_chain.call(inputs).await
    }
}
