//! Document, page and chunk types with source tracking for citations

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Supported source formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a file name
    pub fn from_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }
}

/// A source document handed to ingestion: raw bytes plus a human-readable name
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name or remote item name, used in citations
    pub name: String,
    /// Raw document bytes
    pub bytes: Bytes,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// File type inferred from the name
    pub fn file_type(&self) -> FileType {
        FileType::from_name(&self.name)
    }

    /// SHA-256 of the raw bytes, hex encoded
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}

/// Text extracted from one page of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Extracted text
    pub text: String,
    /// Name of the document the page belongs to
    pub source_name: String,
    /// 0-based page position within the document
    pub page_number: u32,
}

impl Page {
    pub fn new(text: impl Into<String>, source_name: impl Into<String>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            source_name: source_name.into(),
            page_number,
        }
    }

    /// Metadata inherited by every chunk cut from this page
    pub fn source(&self) -> ChunkSource {
        ChunkSource {
            source_name: self.source_name.clone(),
            page_number: self.page_number,
        }
    }
}

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Document name as supplied at ingestion
    pub source_name: String,
    /// 0-based page position
    pub page_number: u32,
}

impl ChunkSource {
    /// 1-based page number for display
    pub fn display_page(&self) -> u32 {
        self.page_number + 1
    }

    /// Format source for display
    pub fn format_citation(&self) -> String {
        format!("{}, Page {}", self.source_name, self.display_page())
    }
}

/// A bounded span of page text, the atomic retrieval unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content
    pub text: String,
    /// Source information for citations
    pub source: ChunkSource,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: ChunkSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}
