//! Tests for prompt templates, the LLM chain, and the stuff-documents chain.

mod common;

use std::sync::Arc;

use adk_chat_rag::{
    CONDENSE_QUESTION_TEMPLATE, Chain, ChainValues, Document, LlmChain, PromptTemplate,
    QA_TEMPLATE, RagError, StuffDocumentsChain,
};
use common::ScriptedLlm;
use serde_json::json;

fn values(pairs: &[(&str, serde_json::Value)]) -> ChainValues {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn default_templates_declare_their_variables() {
    let condense = PromptTemplate::new(CONDENSE_QUESTION_TEMPLATE).unwrap();
    assert_eq!(condense.input_variables(), &["chat_history", "question"]);
    let qa = PromptTemplate::new(QA_TEMPLATE).unwrap();
    assert_eq!(qa.input_variables(), &["context", "question"]);
}

#[test]
fn template_substitutes_and_escapes() {
    let template = PromptTemplate::new("{{literal}} {name} has {count} items").unwrap();
    assert_eq!(template.input_variables(), &["count", "name"]);
    let rendered =
        template.format(&values(&[("name", json!("cart")), ("count", json!(3))])).unwrap();
    assert_eq!(rendered, "{literal} cart has 3 items");
}

#[test]
fn template_reports_missing_values_and_bad_syntax() {
    let template = PromptTemplate::new("{a} and {b}").unwrap();
    let err = template.format(&values(&[("a", json!("x"))])).unwrap_err();
    assert!(matches!(err, RagError::MissingInput { ref key } if key == "b"));

    for bad in ["{open", "close}", "{}"] {
        assert!(matches!(PromptTemplate::new(bad), Err(RagError::Config(_))), "{bad}");
    }
}

#[tokio::test]
async fn llm_chain_returns_first_generation() {
    let llm = Arc::new(ScriptedLlm::new("m", &["first", "second"]));
    let chain = LlmChain::new(PromptTemplate::new("Q: {question}").unwrap(), llm.clone())
        .with_output_key("answer");
    assert_eq!(chain.input_keys(), vec!["question"]);
    assert_eq!(chain.output_keys(), vec!["answer"]);

    let out = chain.call(values(&[("question", json!("why?"))])).await.unwrap();
    assert_eq!(out, values(&[("answer", json!("first"))]));
    assert_eq!(llm.prompts(), vec!["Q: why?"]);
}

#[tokio::test]
async fn llm_chain_rejects_empty_generation_list() {
    let llm = Arc::new(ScriptedLlm::new("m", &[]));
    let chain = LlmChain::new(PromptTemplate::new("{question}").unwrap(), llm);
    let err = chain.call(values(&[("question", json!("q"))])).await.unwrap_err();
    assert!(matches!(err, RagError::Llm { .. }));
}

#[tokio::test]
async fn stuff_chain_joins_documents_into_context() {
    let llm = Arc::new(ScriptedLlm::new("m", &["answer"]));
    let prompt = PromptTemplate::new(QA_TEMPLATE).unwrap();
    let chain = StuffDocumentsChain::new(LlmChain::new(prompt, llm.clone()));
    assert_eq!(chain.input_keys(), vec!["input_documents", "question"]);
    let documents = vec![Document::new("alpha"), Document::new("beta")];
    assert_eq!(chain.combine_documents(&documents), "alpha\n\nbeta");

    let out = chain
        .call(values(&[
            ("question", json!("what?")),
            ("input_documents", serde_json::to_value(&documents).unwrap()),
            ("chat_history", json!("")),
        ]))
        .await
        .unwrap();
    assert_eq!(out["text"], "answer");
    let prompts = llm.prompts();
    assert!(prompts[0].contains("alpha\n\nbeta\n\nQuestion: what?"));
}

#[tokio::test]
async fn stuff_chain_requires_documents() {
    let llm = Arc::new(ScriptedLlm::new("m", &["answer"]));
    let chain =
        StuffDocumentsChain::new(LlmChain::new(PromptTemplate::new("{context}").unwrap(), llm));

    let err = chain.call(values(&[("question", json!("q"))])).await.unwrap_err();
    assert!(matches!(err, RagError::MissingInput { ref key } if key == "input_documents"));

    let err = chain.call(values(&[("input_documents", json!("nope"))])).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
}

#[tokio::test]
async fn stuff_chain_custom_variable_and_separator() {
    let llm = Arc::new(ScriptedLlm::new("m", &["ok"]));
    let prompt = PromptTemplate::new("[{docs}] {question}").unwrap();
    let chain = StuffDocumentsChain::new(LlmChain::new(prompt, llm.clone()))
        .with_document_variable_name("docs")
        .with_separator(" | ");
    assert_eq!(chain.input_keys(), vec!["input_documents", "question"]);

    let documents = json!([{"pageContent": "a"}, {"pageContent": "b", "metadata": {"k": 1}}]);
    chain
        .call(values(&[("input_documents", documents), ("question", json!("q?"))]))
        .await
        .unwrap();
    assert_eq!(llm.prompts(), vec!["[a | b] q?"]);
}
