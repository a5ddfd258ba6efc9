//! Answer synthesis from retrieved passages

use std::sync::Arc;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::providers::CompletionProvider;
use crate::types::{Answer, Chunk};

use super::prompt::PromptBuilder;

/// Turns a question plus retrieved passages into a cited answer
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: Arc<dyn CompletionProvider>,
    model: ModelConfig,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn CompletionProvider>, model: ModelConfig) -> Self {
        Self { llm, model }
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Complete a grounded prompt; `sources` is exactly `chunks`
    pub async fn synthesize(&self, question: &str, chunks: Vec<Chunk>, history: &str) -> Result<Answer> {
        let prompt = PromptBuilder::build_rag_prompt(question, &chunks, history);

        tracing::debug!(
            provider = self.llm.name(),
            model = %self.model.model_name,
            passages = chunks.len(),
            prompt_len = prompt.len(),
            "Synthesizing answer"
        );

        let answer = self.llm.complete(&prompt, &self.model).await.map_err(|e| match e {
            Error::Synthesis(_) => e,
            other => Error::synthesis(other.to_string()),
        })?;

        Ok(Answer {
            answer: answer.trim().to_string(),
            sources: chunks,
        })
    }
}
