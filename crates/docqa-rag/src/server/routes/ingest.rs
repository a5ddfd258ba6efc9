//! Document ingestion endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::{FolderSource, UploadedDocuments};
use crate::server::state::AppState;
use crate::session::SessionState;
use crate::types::{IngestReport, SourceDocument};

/// Ingestion outcome returned to clients
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub session_id: Uuid,
    pub state: SessionState,
    #[serde(flatten)]
    pub report: IngestReport,
    pub processing_time_ms: u64,
}

/// Body of a folder ingestion request
#[derive(Debug, Deserialize)]
pub struct FolderIngestRequest {
    /// Folder under the configured `ingestion.folder_root`, absolute or relative to it
    pub path: String,
    /// File extensions to pick up (default: pdf)
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

/// POST /api/sessions/:id/ingest - Upload and index PDF files
pub async fn ingest_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let session = state.session(&id)?;
    let mut uploads = UploadedDocuments::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::Config(format!("Failed to read multipart field: {}", e))
    })? {
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("upload_{}.pdf", uploads.len() + 1));

        let data = field.bytes().await.map_err(|e| {
            Error::Config(format!("Failed to read '{}': {}", filename, e))
        })?;

        let document = SourceDocument::new(filename, data);
        tracing::info!(
            session = %id,
            file_type = ?document.file_type(),
            "Received file: {} ({} bytes)",
            document.name,
            document.bytes.len()
        );
        uploads.push(document);
    }

    let mut session = session.lock().await;
    let report = session.ingest_from(&uploads).await?;

    Ok(Json(IngestResponse {
        session_id: id,
        state: session.state(),
        report,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// POST /api/sessions/:id/ingest/folder - Index every matching file under a folder
/// inside the configured folder root
pub async fn ingest_folder(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<FolderIngestRequest>,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    if request.path.trim().is_empty() {
        return Err(Error::Config("path must not be empty".to_string()));
    }

    let session = state.session(&id)?;
    let root = state.config().ingestion.folder_root.as_deref().ok_or_else(|| {
        Error::Forbidden("folder ingestion is disabled (set ingestion.folder_root)".to_string())
    })?;

    let mut source = FolderSource::within(root, FsPath::new(&request.path)).await?;
    if let Some(extensions) = request.extensions {
        FolderSource::check_extensions(&extensions)?;
        source = source.with_extensions(extensions);
    }

    tracing::info!(session = %id, folder = %request.path, "Ingesting folder");

    let mut session = session.lock().await;
    let report = session.ingest_from(&source).await?;

    Ok(Json(IngestResponse {
        session_id: id,
        state: session.state(),
        report,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
