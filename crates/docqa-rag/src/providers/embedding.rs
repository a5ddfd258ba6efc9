//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI embeddings API (text-embedding-3-small)
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Get embedding dimensions (e.g., 1536 for text-embedding-3-small)
    fn dimensions(&self) -> usize;

    /// Model identifier recorded in the index header
    fn model(&self) -> &str;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Embed `texts` in batches of at most `batch_size`, checking that the
/// provider returned one vector of the expected dimension per input
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let expected_dims = provider.dimensions();
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_number, batch) in texts.chunks(batch_size).enumerate() {
        tracing::debug!(
            provider = provider.name(),
            batch = batch_number,
            size = batch.len(),
            "Embedding batch"
        );

        let embedded = provider.embed_batch(batch).await?;
        if embedded.len() != batch.len() {
            return Err(Error::embedding(format!(
                "{} returned {} vectors for {} texts",
                provider.name(),
                embedded.len(),
                batch.len()
            )));
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != expected_dims) {
            return Err(Error::embedding(format!(
                "{} returned a {}-dimensional vector, expected {}",
                provider.name(),
                bad.len(),
                expected_dims
            )));
        }

        vectors.extend(embedded);
    }

    Ok(vectors)
}
