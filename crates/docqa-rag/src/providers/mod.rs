//! Provider abstractions for embeddings and completions
//!
//! Trait-based so the pipeline can switch between the OpenAI API and a
//! local Ollama server, and so tests can substitute deterministic fakes.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod retry;

use std::sync::Arc;

pub use embedding::{embed_in_batches, EmbeddingProvider};
pub use llm::CompletionProvider;
pub use ollama::{OllamaClient, OllamaCompletion, OllamaEmbedder};
pub use openai::{OpenAiClient, OpenAiCompletion, OpenAiEmbedder};
pub use retry::{AttemptError, RetryPolicy};

use crate::config::{ProviderKind, RagConfig};
use crate::error::Result;

/// Embedding provider selected by `embeddings.provider`
pub fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embeddings.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiEmbedder::new(&config.llm, &config.embeddings)?),
        ProviderKind::Ollama => Arc::new(OllamaEmbedder::new(&config.llm, &config.embeddings)?),
    };

    tracing::info!(
        provider = provider.name(),
        model = provider.model(),
        dimensions = provider.dimensions(),
        "Embedding provider ready"
    );
    Ok(provider)
}

/// Completion provider selected by `llm.provider`
pub fn build_completion(config: &RagConfig) -> Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.llm.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiCompletion::new(&config.llm)?),
        ProviderKind::Ollama => Arc::new(OllamaCompletion::new(&config.llm)?),
    };

    tracing::info!(provider = provider.name(), "Completion provider ready");
    Ok(provider)
}
