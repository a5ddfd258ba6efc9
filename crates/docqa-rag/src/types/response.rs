//! Result types returned by ingestion and question answering

use serde::{Deserialize, Serialize};

use super::document::Chunk;
use crate::error::Stage;

/// Longest snippet shown in a citation
const SNIPPET_MAX_CHARS: usize = 300;

/// A synthesized answer together with the passages placed in its prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated answer text
    pub answer: String,
    /// Exactly the chunks the model saw, in prompt order
    pub sources: Vec<Chunk>,
}

impl Answer {
    /// Citations for display, numbered as in the prompt
    pub fn citations(&self) -> Vec<Citation> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, chunk)| Citation::from_chunk(i + 1, chunk))
            .collect()
    }
}

/// Citation from a source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// Position in the prompt's context section (1-based)
    pub index: usize,
    /// Source document name
    pub source_name: String,
    /// 1-based page number
    pub page: u32,
    /// Leading part of the chunk text
    pub snippet: String,
}

impl Citation {
    pub fn from_chunk(index: usize, chunk: &Chunk) -> Self {
        Self {
            index,
            source_name: chunk.source.source_name.clone(),
            page: chunk.source.display_page(),
            snippet: truncate_snippet(&chunk.text, SNIPPET_MAX_CHARS),
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        format!("[{}] {} - Page {}", self.index, self.source_name, self.page)
    }
}

/// Truncate snippet to a maximum length while preserving word boundaries
pub fn truncate_snippet(snippet: &str, max_chars: usize) -> String {
    if snippet.chars().count() <= max_chars {
        return snippet.to_string();
    }

    let end = snippet
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(snippet.len());

    // Try to end at a word boundary
    if let Some(pos) = snippet[..end].rfind(' ') {
        return format!("{}...", &snippet[..pos]);
    }

    format!("{}...", &snippet[..end])
}

/// Summary of one successfully loaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedDocument {
    pub source_name: String,
    /// Pages with extractable text
    pub pages: usize,
    pub chunks: usize,
    /// SHA-256 of the source bytes
    pub content_hash: String,
}

/// A document whose contribution was dropped from an ingestion batch
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub source_name: String,
    pub stage: Stage,
    pub message: String,
}

/// Outcome of an ingestion batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub documents: Vec<IngestedDocument>,
    pub failures: Vec<LoadFailure>,
    /// Chunks added by this batch
    pub total_chunks: usize,
    /// Entries in the index after the merge
    pub index_size: usize,
}

impl IngestReport {
    /// True when the batch contained no documents at all
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.failures.is_empty()
    }
}
