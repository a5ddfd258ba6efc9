//! Brute-force vector index over chunk embeddings

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Chunk;

/// Similarity metric, fixed when an index is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Euclidean distance; similarity is the negated distance
    L2,
}

impl Metric {
    /// Higher is more similar
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::L2 => -l2_distance(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Properties every vector in an index shares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub embedding_model: String,
    pub dimensions: usize,
    pub metric: Metric,
}

/// One stored passage and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl IndexEntry {
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// A search result with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub entry: IndexEntry,
    pub score: f32,
}

/// Append-only collection of entries, searched by exhaustive scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    header: IndexHeader,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from embedded chunks; all vectors must share one dimension
    pub fn build(
        metric: Metric,
        embedding_model: impl Into<String>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        let first = entries
            .first()
            .ok_or_else(|| Error::EmptyInput("no entries to index".to_string()))?;
        let dimensions = first.vector.len();
        if dimensions == 0 {
            return Err(Error::IndexMismatch("vectors must not be empty".to_string()));
        }

        let index = Self {
            header: IndexHeader {
                embedding_model: embedding_model.into(),
                dimensions,
                metric,
            },
            entries,
        };
        index.check_entries()?;
        Ok(index)
    }

    /// A new index holding this index's entries followed by `incoming`'s.
    ///
    /// Neither input is modified.
    pub fn merge(&self, incoming: &VectorIndex) -> Result<VectorIndex> {
        self.check_compatible(&incoming.header)?;

        let mut entries = Vec::with_capacity(self.entries.len() + incoming.entries.len());
        entries.extend_from_slice(&self.entries);
        entries.extend_from_slice(&incoming.entries);

        Ok(Self {
            header: self.header.clone(),
            entries,
        })
    }

    /// Up to `k` entries, most similar first; ties keep insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::Config("k must be greater than 0".to_string()));
        }
        if query.len() != self.header.dimensions {
            return Err(Error::IndexMismatch(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.header.dimensions
            )));
        }

        let metric = self.header.metric;
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let score = metric.similarity(&entry.vector, query);
                (position, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                entry: self.entries[position].clone(),
                score,
            })
            .collect())
    }

    /// Fail with `IndexMismatch` unless `other` describes the same vector space
    pub fn check_compatible(&self, other: &IndexHeader) -> Result<()> {
        let ours = &self.header;
        if ours.embedding_model != other.embedding_model {
            return Err(Error::IndexMismatch(format!(
                "embedding model '{}' does not match index model '{}'",
                other.embedding_model, ours.embedding_model
            )));
        }
        if ours.dimensions != other.dimensions {
            return Err(Error::IndexMismatch(format!(
                "{} dimensions do not match index dimensions {}",
                other.dimensions, ours.dimensions
            )));
        }
        if ours.metric != other.metric {
            return Err(Error::IndexMismatch(format!(
                "metric '{}' does not match index metric '{}'",
                other.metric.as_str(),
                ours.metric.as_str()
            )));
        }
        Ok(())
    }

    /// Verify every entry matches the header
    pub(crate) fn check_entries(&self) -> Result<()> {
        if let Some((position, entry)) = self
            .entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.vector.len() != self.header.dimensions)
        {
            return Err(Error::IndexMismatch(format!(
                "entry {} ({}) has {} dimensions, expected {}",
                position,
                entry.chunk.source.source_name,
                entry.vector.len(),
                self.header.dimensions
            )));
        }
        Ok(())
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn dimensions(&self) -> usize {
        self.header.dimensions
    }

    pub fn metric(&self) -> Metric {
        self.header.metric
    }

    pub fn embedding_model(&self) -> &str {
        &self.header.embedding_model
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
