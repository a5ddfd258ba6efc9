//! RAG session: owns the index and conversation, sequences ingestion and querying

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::{ModelConfig, RagConfig};
use crate::error::{Error, Result};
use crate::generation::AnswerSynthesizer;
use crate::ingestion::{DocumentLoader, DocumentSource, TextChunker};
use crate::memory::ConversationMemory;
use crate::providers::{embed_in_batches, CompletionProvider, EmbeddingProvider};
use crate::retrieval::{IndexEntry, Metric, Retriever, SnapshotStore, VectorIndex};
use crate::types::{
    Answer, Chunk, IngestReport, IngestedDocument, LoadFailure, SourceDocument, Turn,
};

/// Lifecycle position, derived from what the session holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No index in memory
    Uninitialized,
    /// Index present, no answer synthesizer yet
    Indexed,
    /// Index, memory and synthesizer present; questions can be asked
    Ready,
}

/// Per-session tunables taken from `RagConfig`
#[derive(Debug, Clone)]
struct SessionSettings {
    top_k: usize,
    metric: Metric,
    batch_size: usize,
    parallel_documents: usize,
    max_turns: Option<usize>,
}

/// One conversational session over one logical index
pub struct RagSession {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn CompletionProvider>,
    retriever: Retriever,
    chunker: TextChunker,
    store: SnapshotStore,
    settings: SessionSettings,
    index: Option<Arc<VectorIndex>>,
    memory: Option<ConversationMemory>,
    synthesizer: Option<AnswerSynthesizer>,
}

impl RagSession {
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn CompletionProvider>,
        store: SnapshotStore,
    ) -> Result<Self> {
        if config.retrieval.top_k == 0 {
            return Err(Error::Config("top_k must be greater than 0".to_string()));
        }

        Ok(Self {
            retriever: Retriever::new(Arc::clone(&embedder)),
            chunker: TextChunker::from_config(&config.chunking)?,
            embedder,
            llm,
            store,
            settings: SessionSettings {
                top_k: config.retrieval.top_k,
                metric: config.retrieval.metric,
                batch_size: config.embeddings.batch_size,
                parallel_documents: config.processing.parallel_documents.max(1),
                max_turns: config.memory.max_turns,
            },
            index: None,
            memory: None,
            synthesizer: None,
        })
    }

    pub fn state(&self) -> SessionState {
        match (&self.index, &self.synthesizer) {
            (Some(_), Some(_)) => SessionState::Ready,
            (Some(_), None) => SessionState::Indexed,
            (None, _) => SessionState::Uninitialized,
        }
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_deref()
    }

    /// Entries in the in-memory index
    pub fn indexed_chunks(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.len())
    }

    pub fn memory(&self) -> Option<&ConversationMemory> {
        self.memory.as_ref()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Fetch documents from `source` and ingest them
    pub async fn ingest_from(&mut self, source: &dyn DocumentSource) -> Result<IngestReport> {
        let documents = source.fetch().await?;
        tracing::info!(source = source.name(), documents = documents.len(), "Fetched documents");
        self.ingest(documents).await
    }

    /// Load, chunk, embed and index `documents`, merging them into the
    /// persisted index and saving the result.
    ///
    /// The session's index becomes the saved one, so entries other sessions
    /// added since the last ingest are picked up. Documents that fail to load
    /// are reported and skipped. An embedding or save failure leaves both the
    /// session's index and the snapshot unchanged.
    pub async fn ingest(&mut self, documents: Vec<SourceDocument>) -> Result<IngestReport> {
        if documents.is_empty() {
            tracing::info!("No documents to ingest");
            return Ok(IngestReport {
                index_size: self.indexed_chunks(),
                ..IngestReport::default()
            });
        }

        let start = Instant::now();
        let document_count = documents.len();
        tracing::info!(documents = document_count, "Starting ingestion");

        let (ingested, failures, chunks) = self.load_and_chunk(documents).await?;

        if chunks.is_empty() {
            return Err(Error::EmptyInput(format!(
                "{} document(s) produced no text ({} failed to load)",
                document_count,
                failures.len()
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_in_batches(self.embedder.as_ref(), &texts, self.settings.batch_size)
            .await
            .map_err(|e| {
                tracing::error!(chunks = texts.len(), "Embedding failed, ingestion aborted: {}", e);
                e
            })?;

        let entries = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| IndexEntry::new(vector, chunk))
            .collect();
        let incoming = VectorIndex::build(self.settings.metric, self.embedder.model(), entries)?;
        let total_chunks = incoming.len();

        // Merge into what is persisted now, which includes other sessions'
        // entries; the session's own index is the base only when no snapshot exists
        let store = self.store.clone();
        let fallback = self.index.clone();
        let merged = tokio::task::spawn_blocking(move || {
            store.update(|persisted| match (persisted, &fallback) {
                (Some(current), _) => current.merge(&incoming),
                (None, Some(current)) => current.merge(&incoming),
                (None, None) => Ok(incoming.clone()),
            })
        })
        .await
        .map_err(|e| Error::internal(format!("snapshot task failed: {}", e)))?
        .map_err(|e| {
            tracing::error!("Updating the index failed, ingestion aborted: {}", e);
            e
        })?;
        let merged = Arc::new(merged);

        self.index = Some(Arc::clone(&merged));

        tracing::info!(
            documents = ingested.len(),
            failed = failures.len(),
            chunks = total_chunks,
            index_size = merged.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ingestion complete"
        );

        Ok(IngestReport {
            documents: ingested,
            failures,
            total_chunks,
            index_size: merged.len(),
        })
    }

    /// Load the persisted index if needed, then start a fresh conversation
    pub async fn initialize(&mut self, model: ModelConfig) -> Result<()> {
        if self.index.is_none() {
            let index = self.load_persisted().await?.ok_or_else(|| {
                Error::NotFound(self.store.dir().display().to_string())
            })?;
            self.index = Some(Arc::new(index));
        }

        tracing::info!(
            model = %model.model_name,
            temperature = model.temperature,
            index_size = self.indexed_chunks(),
            "Session initialized"
        );

        self.memory = Some(ConversationMemory::with_max_turns(self.settings.max_turns));
        self.synthesizer = Some(AnswerSynthesizer::new(Arc::clone(&self.llm), model));
        Ok(())
    }

    /// Answer `question` from the index and conversation so far.
    ///
    /// Memory only changes when an answer is produced.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let (index, synthesizer, memory) = match (&self.index, &self.synthesizer, &self.memory) {
            (Some(index), Some(synthesizer), Some(memory)) => (index, synthesizer, memory),
            _ => {
                return Err(Error::NotReady(
                    "ingest documents and initialize the session first".to_string(),
                ))
            }
        };

        let start = Instant::now();
        let history = memory.history_as_text();
        let chunks = self
            .retriever
            .retrieve(index, question, self.settings.top_k)
            .await?;
        let answer = synthesizer.synthesize(question, chunks, &history).await?;

        if let Some(memory) = self.memory.as_mut() {
            memory.append_exchange(
                Turn::user(question),
                Turn::assistant(answer.answer.clone(), answer.sources.clone()),
            );
        }

        tracing::info!(
            sources = answer.sources.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Question answered"
        );

        Ok(answer)
    }

    /// Forget the conversation; the session stays ready
    pub fn clear_memory(&mut self) -> Result<()> {
        if self.state() != SessionState::Ready {
            return Err(Error::NotReady("session has no conversation to clear".to_string()));
        }
        if let Some(memory) = self.memory.as_mut() {
            memory.clear();
        }
        Ok(())
    }

    /// Load and chunk every document with bounded parallelism, in input order
    async fn load_and_chunk(
        &self,
        documents: Vec<SourceDocument>,
    ) -> Result<(Vec<IngestedDocument>, Vec<LoadFailure>, Vec<Chunk>)> {
        let chunker = self.chunker.clone();
        let results: Vec<_> = stream::iter(documents)
            .map(|document| {
                let chunker = chunker.clone();
                async move {
                    let outcome = tokio::task::spawn_blocking({
                        let document = document.clone();
                        move || {
                            let pages = DocumentLoader::load(&document.bytes, &document.name)?;
                            let chunks = chunker.chunk_pages(&pages);
                            Ok::<_, Error>((pages.len(), chunks))
                        }
                    })
                    .await
                    .unwrap_or_else(|e| {
                        Err(Error::load(&document.name, format!("loader task failed: {}", e)))
                    });
                    (document, outcome)
                }
            })
            .buffered(self.settings.parallel_documents)
            .collect()
            .await;

        let mut ingested = Vec::new();
        let mut failures = Vec::new();
        let mut chunks = Vec::new();

        for (document, outcome) in results {
            match outcome {
                Ok((pages, document_chunks)) => {
                    tracing::debug!(
                        source = %document.name,
                        pages,
                        chunks = document_chunks.len(),
                        "Document chunked"
                    );
                    ingested.push(IngestedDocument {
                        source_name: document.name.clone(),
                        pages,
                        chunks: document_chunks.len(),
                        content_hash: document.content_hash(),
                    });
                    chunks.extend(document_chunks);
                }
                Err(e @ Error::Load { .. }) => {
                    tracing::warn!(source = %document.name, "Skipping document: {}", e);
                    failures.push(LoadFailure {
                        source_name: document.name.clone(),
                        stage: e.stage(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok((ingested, failures, chunks))
    }

    async fn load_persisted(&self) -> Result<Option<VectorIndex>> {
        let store = self.store.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| Error::internal(format!("snapshot task failed: {}", e)))?;

        match loaded {
            Ok(index) => {
                tracing::info!(
                    path = %self.store.dir().display(),
                    entries = index.len(),
                    "Loaded persisted index"
                );
                Ok(Some(index))
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
