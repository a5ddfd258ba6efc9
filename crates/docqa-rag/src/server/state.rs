//! Application state for the Q&A server

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{self, CompletionProvider, EmbeddingProvider};
use crate::retrieval::SnapshotStore;
use crate::session::RagSession;

/// A session shared between request handlers
pub type SharedSession = Arc<Mutex<RagSession>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Embedding provider (OpenAI or Ollama)
    embedder: Arc<dyn EmbeddingProvider>,
    /// Completion provider (OpenAI or Ollama)
    llm: Arc<dyn CompletionProvider>,
    /// Snapshot location shared by every session
    store: SnapshotStore,
    /// Live sessions by id
    sessions: DashMap<Uuid, SharedSession>,
}

impl AppState {
    /// Create state with the providers selected in `config`
    pub fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let embedder = providers::build_embedder(&config)?;
        let llm = providers::build_completion(&config)?;
        Ok(Self::with_providers(config, embedder, llm))
    }

    /// Create state around already-built providers
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn CompletionProvider>,
    ) -> Self {
        tracing::info!(
            index_path = %config.index.storage_path.display(),
            "Application state initialized"
        );

        let store = SnapshotStore::new(config.index.storage_path.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                embedder,
                llm,
                store,
                sessions: DashMap::new(),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn llm(&self) -> &Arc<dyn CompletionProvider> {
        &self.inner.llm
    }

    /// Register a new session and return its id
    pub fn create_session(&self) -> Result<Uuid> {
        let session = RagSession::new(
            &self.inner.config,
            Arc::clone(&self.inner.embedder),
            Arc::clone(&self.inner.llm),
            self.inner.store.clone(),
        )?;

        let id = Uuid::new_v4();
        self.inner.sessions.insert(id, Arc::new(Mutex::new(session)));
        tracing::info!(session = %id, "Session created");
        Ok(id)
    }

    /// Look up a session by id
    pub fn session(&self, id: &Uuid) -> Result<SharedSession> {
        self.inner
            .sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownSession(id.to_string()))
    }

    /// Drop a session; false if it did not exist
    pub fn remove_session(&self, id: &Uuid) -> bool {
        let removed = self.inner.sessions.remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "Session removed");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }
}
