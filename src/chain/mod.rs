//! Retrieval chain
//!
//! Composes the vector index and a completion backend behind a fixed
//! instruction template. The template is part of the contract: answer only
//! from the supplied context, admit not knowing, three sentences maximum.

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::llm::Completer;
use std::sync::Arc;
use tracing::debug;

/// Returned whenever a question arrives before anything was ingested.
pub const NOT_READY_MESSAGE: &str = "Please, add a document or connect to a database first.";

const PROMPT_TEMPLATE: &str = "\
<s> [INST] You are an assistant for question-answering tasks. Use the following pieces of retrieved context \
to answer the question. If you don't know the answer, just say that you don't know. Use three sentences \
maximum and keep the answer concise. [/INST] </s> \
[INST] Question: {question} \
Context: {context} \
Answer: [/INST]";

/// Answers questions over whatever the current index contains.
pub struct RetrievalChain {
    completer: Arc<dyn Completer>,
    k: usize,
    score_threshold: f32,
}

impl RetrievalChain {
    pub fn new(completer: Arc<dyn Completer>, config: &RetrievalConfig) -> Self {
        Self {
            completer,
            k: config.k,
            score_threshold: config.score_threshold,
        }
    }

    /// Retrieve context for the question and ask the model.
    ///
    /// An index that is not ready yields the fixed guidance message; empty
    /// retrieval falls back to the full ingested context so the model is
    /// never asked to answer blind.
    pub async fn answer(&self, index: &VectorIndex, question: &str) -> Result<String> {
        if !index.is_ready() {
            return Ok(NOT_READY_MESSAGE.to_string());
        }

        let retrieved = index.search(question, self.k, self.score_threshold).await?;
        let context = if retrieved.is_empty() {
            debug!("No chunks above threshold; using fallback context");
            index.fallback_context().to_string()
        } else {
            retrieved
                .iter()
                .map(|chunk| chunk.content())
                .collect::<Vec<_>>()
                .join(" ")
        };

        let prompt = build_prompt(question, &context);
        self.completer.complete(&prompt).await
    }
}

fn build_prompt(question: &str, context: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{question}", question)
        .replace("{context}", context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::embed::Embedder;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Maps any text to a constant vector, so every chunk matches every
    /// query with score 1.0.
    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn model_name(&self) -> &str {
            "constant"
        }
    }

    /// Records the prompt and echoes a canned answer.
    struct EchoCompleter {
        last_prompt: Mutex<String>,
    }

    impl EchoCompleter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                last_prompt: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl Completer for EchoCompleter {
        async fn complete(&self, prompt: &str) -> Result<String> {
            *self.last_prompt.lock().map_err(|e| Error::Other(e.to_string()))? =
                prompt.to_string();
            Ok("The sky is blue.".to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn chain_config() -> RetrievalConfig {
        RetrievalConfig {
            k: 3,
            score_threshold: 0.5,
        }
    }

    #[tokio::test]
    async fn test_not_ready_returns_guidance() {
        let index = VectorIndex::new(Arc::new(ConstantEmbedder));
        let chain = RetrievalChain::new(EchoCompleter::new(), &chain_config());

        let answer = chain.answer(&index, "anything?").await.unwrap();
        assert_eq!(answer, NOT_READY_MESSAGE);
    }

    #[tokio::test]
    async fn test_prompt_embeds_question_and_retrieved_context() {
        let mut index = VectorIndex::new(Arc::new(ConstantEmbedder));
        index
            .rebuild(vec![Chunk::new("The sky is blue.").unwrap()])
            .await
            .unwrap();

        let completer = EchoCompleter::new();
        let chain = RetrievalChain::new(completer.clone(), &chain_config());
        let answer = chain.answer(&index, "What color is the sky?").await.unwrap();

        assert!(answer.contains("blue"));
        let prompt = completer.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("Question: What color is the sky?"));
        assert!(prompt.contains("Context: The sky is blue."));
        assert!(prompt.contains("three sentences"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_substitutes_fallback_context() {
        let mut index = VectorIndex::new(Arc::new(ConstantEmbedder));
        index
            .rebuild(vec![Chunk::new("Orders reference users.").unwrap()])
            .await
            .unwrap();

        let completer = EchoCompleter::new();
        // Threshold above 1.0 so nothing ever qualifies.
        let chain = RetrievalChain::new(
            completer.clone(),
            &RetrievalConfig {
                k: 3,
                score_threshold: 2.0,
            },
        );
        chain.answer(&index, "question").await.unwrap();

        let prompt = completer.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("Context: Orders reference users."));
    }
}
