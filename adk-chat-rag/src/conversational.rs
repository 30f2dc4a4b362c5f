//! Conversational retrieval chain.
//!
//! The [`ConversationalRetrievalChain`] answers a follow-up question in a
//! conversation by running, strictly in order:
//!
//! 1. **validate** – the question and chat history inputs must be present
//! 2. **normalize history** – the history becomes a role-prefixed transcript
//! 3. **condense question** – with a non-empty transcript, the condenser
//!    rewrites the question into a standalone one; otherwise the question is
//!    used verbatim
//! 4. **retrieve** – the retriever fetches documents for that question
//! 5. **synthesize** – the combine-documents chain produces the answer
//! 6. **finalize** – retrieved documents are merged into the result when
//!    `return_source_documents` is enabled
//!
//! Any failure aborts the remaining stages and is returned unchanged. No
//! stage is retried and no timeout is applied; wrap the call in
//! `tokio::time::timeout` to impose a deadline. Dropping the returned
//! future cancels the in-flight sub-call.
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_chat_rag::{ConversationalRetrievalChain, FromLlmOptions, Turn};
//!
//! let options = FromLlmOptions::default();
//! let chain = ConversationalRetrievalChain::from_llm(llm, retriever, options)?;
//! let history = vec![Turn::human("What is Rust?"), Turn::assistant("A language.")];
//! let result = chain.run("And how fast is it?", history).await?;
//! println!("{}", result.outputs["text"]);
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span};

use crate::chain::{Chain, ChainValues, LlmChain, StuffDocumentsChain};
use crate::config::ChainConfig;
use crate::document::Document;
use crate::error::{RagError, Result, Stage};
use crate::llm::Llm;
use crate::message::ChatHistory;
use crate::prompt::{CONDENSE_QUESTION_TEMPLATE, PromptTemplate, QA_TEMPLATE};
use crate::retriever::Retriever;

/// The outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Output fields produced by the synthesizer.
    pub outputs: ChainValues,
    /// Retrieved documents, present when source documents were requested.
    pub source_documents: Option<Vec<Document>>,
}

impl PipelineResult {
    /// The string stored under `key` in the synthesizer output.
    pub fn output_str(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).and_then(Value::as_str)
    }
}

/// Retrieval-augmented answering over a multi-turn conversation.
///
/// Construct one with [`ConversationalRetrievalChain::builder()`] or
/// [`ConversationalRetrievalChain::from_llm()`]. A single instance can serve
/// concurrent invocations; it holds no per-call state.
pub struct ConversationalRetrievalChain {
    config: ChainConfig,
    retriever: Arc<dyn Retriever>,
    question_generator: Arc<dyn Chain>,
    combine_documents: Arc<dyn Chain>,
}

impl fmt::Debug for ConversationalRetrievalChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationalRetrievalChain")
            .field("config", &self.config)
            .field("question_generator", &self.question_generator.chain_type())
            .field("combine_documents", &self.combine_documents.chain_type())
            .finish_non_exhaustive()
    }
}

/// Options for [`ConversationalRetrievalChain::from_llm`].
#[derive(Default)]
pub struct FromLlmOptions {
    /// Chain configuration (input keys, source documents).
    pub config: ChainConfig,
    /// Template for the condenser; defaults to [`CONDENSE_QUESTION_TEMPLATE`].
    pub condense_template: Option<String>,
    /// Template for the answer; defaults to [`QA_TEMPLATE`].
    pub qa_template: Option<String>,
    /// A separate model for condensation; defaults to the answering model.
    pub condense_llm: Option<Arc<dyn Llm>>,
}

impl ConversationalRetrievalChain {
    /// Create a new [`ConversationalRetrievalChainBuilder`].
    pub fn builder() -> ConversationalRetrievalChainBuilder {
        ConversationalRetrievalChainBuilder::default()
    }

    /// Build a chain whose condenser is an [`LlmChain`] and whose synthesizer
    /// is a [`StuffDocumentsChain`], both backed by `llm` unless
    /// `options.condense_llm` overrides the condenser's model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a template override does not parse.
    pub fn from_llm(
        llm: Arc<dyn Llm>,
        retriever: Arc<dyn Retriever>,
        options: FromLlmOptions,
    ) -> Result<Self> {
        let condense_prompt = PromptTemplate::new(
            options.condense_template.as_deref().unwrap_or(CONDENSE_QUESTION_TEMPLATE),
        )?;
        let qa_prompt =
            PromptTemplate::new(options.qa_template.as_deref().unwrap_or(QA_TEMPLATE))?;

        let condense_llm = options.condense_llm.unwrap_or_else(|| llm.clone());
        let question_generator = LlmChain::new(condense_prompt, condense_llm);
        let combine_documents = StuffDocumentsChain::new(LlmChain::new(qa_prompt, llm));

        Self::builder()
            .config(options.config)
            .retriever(retriever)
            .question_generator(Arc::new(question_generator))
            .combine_documents(Arc::new(combine_documents))
            .build()
    }

    /// Reconstructing a chain from serialized form is not supported.
    ///
    /// # Errors
    ///
    /// Always returns [`RagError::NotImplemented`].
    pub fn deserialize(_data: &Value) -> Result<Self> {
        Err(RagError::NotImplemented(
            "deserializing a conversational_retrieval_chain".to_string(),
        ))
    }

    /// Return a reference to the chain configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Answer `question` given `history`, skipping input-map validation.
    pub async fn run(
        &self,
        question: &str,
        history: impl Into<ChatHistory>,
    ) -> Result<PipelineResult> {
        let history = history.into();
        self.execute(question.to_string(), history)
            .instrument(info_span!("conversational_retrieval"))
            .await
    }

    /// Stages 2 to 6.
    async fn execute(&self, question: String, history: ChatHistory) -> Result<PipelineResult> {
        // 2. Normalize history
        let transcript = history.into_transcript();

        // 3. Condense (skipped on the first turn)
        let standalone = if transcript.is_empty() {
            debug!("empty chat history, using question verbatim");
            question
        } else {
            self.condense(&question, &transcript)
                .await
                .map_err(log_failure(Stage::CondenseQuestion))?
        };

        // 4. Retrieve
        let documents = self
            .retriever
            .get_relevant_documents(&standalone)
            .await
            .map_err(log_failure(Stage::Retrieve))?;
        debug!(document_count = documents.len(), "retrieved documents");

        // 5. Synthesize
        let outputs = self
            .synthesize(&standalone, &documents, transcript)
            .await
            .map_err(log_failure(Stage::Synthesize))?;

        // 6. Finalize
        info!(
            document_count = documents.len(),
            output_keys = ?outputs.keys().collect::<Vec<_>>(),
            "conversational retrieval completed"
        );
        let source_documents = self.config.return_source_documents.then_some(documents);
        Ok(PipelineResult { outputs, source_documents })
    }

    async fn condense(&self, question: &str, transcript: &str) -> Result<String> {
        let mut inputs = ChainValues::new();
        inputs.insert("question".to_string(), Value::String(question.to_string()));
        inputs.insert("chat_history".to_string(), Value::String(transcript.to_string()));

        let outputs = self.question_generator.call(inputs).await?;
        let keys: Vec<String> = outputs.keys().cloned().collect();
        let (1, Some(value)) = (keys.len(), outputs.into_iter().next().map(|(_, v)| v)) else {
            return Err(RagError::AmbiguousOutput { stage: Stage::CondenseQuestion, keys });
        };
        let standalone = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        debug!(standalone_question = %standalone, "condensed question");
        Ok(standalone)
    }

    async fn synthesize(
        &self,
        question: &str,
        documents: &[Document],
        transcript: String,
    ) -> Result<ChainValues> {
        let input_documents = serde_json::to_value(documents).map_err(|e| {
            RagError::InvalidInput(format!("failed to encode retrieved documents: {e}"))
        })?;

        let mut inputs = ChainValues::new();
        inputs.insert("question".to_string(), Value::String(question.to_string()));
        inputs.insert("input_documents".to_string(), input_documents);
        inputs.insert("chat_history".to_string(), Value::String(transcript));
        self.combine_documents.call(inputs).await
    }
}

fn log_failure(stage: Stage) -> impl FnOnce(RagError) -> RagError {
    move |e| {
        error!(stage = %stage, error = %e, "conversational retrieval stage failed");
        e
    }
}

#[async_trait]
impl Chain for ConversationalRetrievalChain {
    fn chain_type(&self) -> &str {
        "conversational_retrieval_chain"
    }

    fn input_keys(&self) -> Vec<String> {
        vec![self.config.input_key.clone(), self.config.chat_history_key.clone()]
    }

    fn output_keys(&self) -> Vec<String> {
        let mut keys = self.combine_documents.output_keys();
        if self.config.return_source_documents {
            keys.push(self.config.source_documents_key.clone());
        }
        keys
    }

    async fn call(&self, inputs: ChainValues) -> Result<ChainValues> {
        // 1. Validate
        let question = inputs.get(&self.config.input_key).ok_or_else(|| {
            log_failure(Stage::Validate)(RagError::MissingInput {
                key: self.config.input_key.clone(),
            })
        })?;
        let history = inputs.get(&self.config.chat_history_key).ok_or_else(|| {
            log_failure(Stage::Validate)(RagError::MissingInput {
                key: self.config.chat_history_key.clone(),
            })
        })?;
        let question = question
            .as_str()
            .ok_or_else(|| {
                RagError::InvalidInput(format!("'{}' must be a string", self.config.input_key))
            })
            .map_err(log_failure(Stage::Validate))?
            .to_string();
        let history =
            ChatHistory::from_value(history).map_err(log_failure(Stage::NormalizeHistory))?;

        let result = self
            .execute(question, history)
            .instrument(info_span!("conversational_retrieval"))
            .await?;

        let mut outputs = result.outputs;
        if let Some(documents) = result.source_documents {
            let encoded = serde_json::to_value(&documents)
                .map_err(|e| {
                    RagError::InvalidInput(format!("failed to encode source documents: {e}"))
                })
                .map_err(log_failure(Stage::Finalize))?;
            outputs.insert(self.config.source_documents_key.clone(), encoded);
        }
        Ok(outputs)
    }
}

/// Builder for constructing a [`ConversationalRetrievalChain`].
///
/// `retriever`, `question_generator` and `combine_documents` are required;
/// `config` defaults to [`ChainConfig::default()`].
///
/// # Example
///
/// ```rust,ignore
/// let chain = ConversationalRetrievalChain::builder()
///     .config(ChainConfig::builder().return_source_documents(true).build()?)
///     .retriever(Arc::new(retriever))
///     .question_generator(Arc::new(condenser))
///     .combine_documents(Arc::new(synthesizer))
///     .build()?;
/// ```
#[derive(Default)]
pub struct ConversationalRetrievalChainBuilder {
    config: Option<ChainConfig>,
    retriever: Option<Arc<dyn Retriever>>,
    question_generator: Option<Arc<dyn Chain>>,
    combine_documents: Option<Arc<dyn Chain>>,
}

impl fmt::Debug for ConversationalRetrievalChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationalRetrievalChainBuilder")
            .field("config", &self.config)
            .field("has_retriever", &self.retriever.is_some())
            .field("question_generator", &self.question_generator.as_ref().map(|c| c.chain_type()))
            .field("combine_documents", &self.combine_documents.as_ref().map(|c| c.chain_type()))
            .finish()
    }
}

impl ConversationalRetrievalChainBuilder {
    /// Set the chain configuration.
    pub fn config(mut self, config: ChainConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the retriever.
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Set the chain that rewrites follow-up questions.
    pub fn question_generator(mut self, chain: Arc<dyn Chain>) -> Self {
        self.question_generator = Some(chain);
        self
    }

    /// Set the chain that answers from retrieved documents.
    pub fn combine_documents(mut self, chain: Arc<dyn Chain>) -> Self {
        self.combine_documents = Some(chain);
        self
    }

    /// Build the [`ConversationalRetrievalChain`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required component is missing.
    pub fn build(self) -> Result<ConversationalRetrievalChain> {
        let retriever = self
            .retriever
            .ok_or_else(|| RagError::Config("retriever is required".to_string()))?;
        let question_generator = self
            .question_generator
            .ok_or_else(|| RagError::Config("question_generator is required".to_string()))?;
        let combine_documents = self
            .combine_documents
            .ok_or_else(|| RagError::Config("combine_documents is required".to_string()))?;

        Ok(ConversationalRetrievalChain {
            config: self.config.unwrap_or_default(),
            retriever,
            question_generator,
            combine_documents,
        })
    }
}
