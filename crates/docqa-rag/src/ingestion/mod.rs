//! Document ingestion: loading, chunking and document sources

mod chunker;
mod parser;
mod source;

pub use chunker::TextChunker;
pub use parser::{cleanup_text, DocumentLoader};
pub use source::{DocumentSource, DriveSource, FolderSource, RemoteDrive, UploadedDocuments};
