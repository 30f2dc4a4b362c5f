//! Minimal `{variable}` prompt templates and the default prompts.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::chain::ChainValues;
use crate::error::{RagError, Result};

/// Rewrites a follow-up question into a standalone one.
pub const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

/// Answers a question from stuffed context.
pub const QA_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:";

/// A prompt with `{name}` placeholders.
///
/// `{{` and `}}` render as literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] on an unclosed or empty placeholder or a
    /// stray closing brace.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let mut variables = BTreeSet::new();
        for segment in parse(&template)? {
            if let Segment::Variable(name) = segment {
                variables.insert(name.to_string());
            }
        }
        Ok(Self { template, variables: variables.into_iter().collect() })
    }

    /// Placeholder names, sorted and de-duplicated.
    pub fn input_variables(&self) -> &[String] {
        &self.variables
    }

    /// The raw template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute every placeholder with the matching value.
    ///
    /// String values are inserted verbatim; other JSON values use their
    /// JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MissingInput`] if a placeholder has no value.
    pub fn format(&self, values: &ChainValues) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        for segment in parse(&self.template)? {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Brace(c) => out.push(c),
                Segment::Variable(name) => match values.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => return Err(RagError::MissingInput { key: name.to_string() }),
                },
            }
        }
        Ok(out)
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Brace(char),
    Variable(&'a str),
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            segments.push(Segment::Literal(&rest[..pos]));
        }
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            segments.push(Segment::Brace('{'));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            segments.push(Segment::Brace('}'));
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            return Err(RagError::Config("stray '}' in prompt template".to_string()));
        } else {
            let end = tail.find('}').ok_or_else(|| {
                RagError::Config("unclosed '{' in prompt template".to_string())
            })?;
            let name = tail[1..end].trim();
            if name.is_empty() || name.contains('{') {
                return Err(RagError::Config(format!("invalid placeholder '{}'", &tail[..=end])));
            }
            segments.push(Segment::Variable(name));
            rest = &tail[end + 1..];
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}
