//! API routes for the Q&A server

pub mod ingest;
pub mod query;
pub mod sessions;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Session lifecycle
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/:id/initialize", post(sessions::initialize_session))
        // Ingestion - with larger body limit for file uploads
        .route(
            "/sessions/:id/ingest",
            post(ingest::ingest_upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/sessions/:id/ingest/folder", post(ingest::ingest_folder))
        // Conversation
        .route("/sessions/:id/ask", post(query::ask))
        .route("/sessions/:id/memory", delete(sessions::clear_memory))
        .route("/sessions/:id/history", get(sessions::get_history))
        // Provider
        .route("/models", get(list_models))
        // Info
        .route("/info", get(info))
}

/// Completion models available to the configured credentials
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub provider: String,
    pub default_model: String,
    pub models: Vec<String>,
}

/// GET /api/models - List the completion models the provider offers
async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>> {
    let models = state.llm().list_models().await?;
    tracing::debug!(provider = state.llm().name(), models = models.len(), "Listed models");

    Ok(Json(ModelsResponse {
        provider: state.llm().name().to_string(),
        default_model: state.config().llm.model_name.clone(),
        models,
    }))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "docqa-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Conversational Q&A over PDF documents with page-level citations",
        "endpoints": {
            "POST /api/sessions": "Start a session",
            "GET /api/sessions/:id": "Session state",
            "DELETE /api/sessions/:id": "End a session",
            "POST /api/sessions/:id/ingest": "Upload PDF files (multipart)",
            "POST /api/sessions/:id/ingest/folder": "Index PDF files under the configured folder root",
            "POST /api/sessions/:id/initialize": "Load the index and start the conversation",
            "POST /api/sessions/:id/ask": "Ask a question",
            "DELETE /api/sessions/:id/memory": "Forget the conversation",
            "GET /api/sessions/:id/history": "Conversation so far",
            "GET /api/models": "Completion models available to the configured credentials"
        }
    }))
}
