//! Completion provider trait for generating answers

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::error::Result;

/// Trait for prompt completion
///
/// Implementations:
/// - `OpenAiCompletion`: OpenAI chat completions (gpt-4o-mini)
/// - `OllamaCompletion`: Local Ollama server (llama3, phi3, etc.)
///
/// Completions are not idempotent and are never retried.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete `prompt` with the given model and temperature
    async fn complete(&self, prompt: &str, model: &ModelConfig) -> Result<String>;

    /// Models the configured credentials can use, sorted by name
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
