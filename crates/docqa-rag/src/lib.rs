//! docqa-rag: conversational question answering over PDF documents
//!
//! Documents are split into overlapping passages, embedded and kept in a
//! persistent vector index. Each session retrieves the passages closest to a
//! question, asks a completion model to answer from them alone, and returns
//! the answer with page-level citations and a running conversation memory.

pub mod auth;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod memory;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod types;

pub use config::{ModelConfig, RagConfig};
pub use error::{Error, Result, Stage};
pub use session::{RagSession, SessionState};
pub use types::{Answer, Chunk, ChunkSource, Citation, IngestReport, Page, SourceDocument};
