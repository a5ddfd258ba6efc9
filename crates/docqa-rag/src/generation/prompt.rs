//! Prompt templates for grounded answer generation

use crate::types::Chunk;

/// Instruction placed at the top of every prompt
pub const SYSTEM_INSTRUCTION: &str = "You are a specialized assistant that answers questions about the user's documents.
Use ONLY the context below to answer the question.
If the answer is not in the context, say that you don't know; do not make up an answer.
Cite the passages you rely on by their bracketed number, e.g. [1].";

const CONTEXT_HEADER: &str = "CONTEXT:";
const HISTORY_HEADER: &str = "CONVERSATION HISTORY:";
const QUESTION_HEADER: &str = "QUESTION:";

/// Shown in place of an empty history
const NO_HISTORY: &str = "(no previous messages)";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Numbered context block; each passage is headed `[n] source_name, Page p`
    pub fn build_context(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                format!(
                    "[{}] {}\n{}",
                    i + 1,
                    chunk.source.format_citation(),
                    chunk.text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Full prompt: instruction, context, history, question
    pub fn build_rag_prompt(question: &str, chunks: &[Chunk], history: &str) -> String {
        let history = if history.trim().is_empty() {
            NO_HISTORY
        } else {
            history
        };

        format!(
            "{instruction}\n\n{context_header}\n{context}\n\n{history_header}\n{history}\n\n{question_header}\n{question}\n\nANSWER:",
            instruction = SYSTEM_INSTRUCTION,
            context_header = CONTEXT_HEADER,
            context = Self::build_context(chunks),
            history_header = HISTORY_HEADER,
            history = history,
            question_header = QUESTION_HEADER,
            question = question.trim(),
        )
    }
}
