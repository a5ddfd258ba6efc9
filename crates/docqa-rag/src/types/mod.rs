//! Core types for the document Q&A pipeline

pub mod conversation;
pub mod document;
pub mod response;

pub use conversation::{Role, Turn};
pub use document::{Chunk, ChunkSource, FileType, Page, SourceDocument};
pub use response::{Answer, Citation, IngestReport, IngestedDocument, LoadFailure};
