//! Question-to-passage retrieval

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

use super::index::{SearchHit, VectorIndex};

/// Embeds a question and searches an index with it
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    /// Top-`k` passages for `question`, most relevant first
    pub async fn retrieve(&self, index: &VectorIndex, question: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .retrieve_scored(index, question, k)
            .await?
            .into_iter()
            .map(|hit| hit.entry.chunk)
            .collect())
    }

    /// Like `retrieve`, keeping similarity scores
    pub async fn retrieve_scored(
        &self,
        index: &VectorIndex,
        question: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::Config("k must be greater than 0".to_string()));
        }
        if self.embedder.model() != index.embedding_model() {
            return Err(Error::IndexMismatch(format!(
                "index was built with '{}' but queries are embedded with '{}'",
                index.embedding_model(),
                self.embedder.model()
            )));
        }

        let query = self.embedder.embed(question).await?;
        let hits = index.search(&query, k)?;

        tracing::debug!(
            k,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "Retrieved passages"
        );

        Ok(hits)
    }
}
