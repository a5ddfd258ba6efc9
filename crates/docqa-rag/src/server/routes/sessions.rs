//! Session lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::session::{RagSession, SessionState};
use crate::types::{Citation, Role};

/// Session summary returned by most session endpoints
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub state: SessionState,
    pub turns: usize,
    pub indexed_chunks: usize,
}

impl SessionStatus {
    pub fn of(session_id: Uuid, session: &RagSession) -> Self {
        Self {
            session_id,
            state: session.state(),
            turns: session.memory().map_or(0, |m| m.len()),
            indexed_chunks: session.indexed_chunks(),
        }
    }
}

/// Optional overrides of the configured model
#[derive(Debug, Default, Deserialize)]
pub struct InitializeRequest {
    pub model_name: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
    pub sources: Vec<Citation>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub turns: Vec<HistoryTurn>,
}

/// POST /api/sessions - Start a new session
pub async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionStatus>)> {
    let id = state.create_session()?;
    let session = state.session(&id)?;
    let session = session.lock().await;
    Ok((StatusCode::CREATED, Json(SessionStatus::of(id, &session))))
}

/// GET /api/sessions/:id - Session state
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>> {
    let session = state.session(&id)?;
    let session = session.lock().await;
    Ok(Json(SessionStatus::of(id, &session)))
}

/// DELETE /api/sessions/:id - End a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.remove_session(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::UnknownSession(id.to_string()))
    }
}

/// POST /api/sessions/:id/initialize - Load the index and start the conversation
pub async fn initialize_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<InitializeRequest>>,
) -> Result<Json<SessionStatus>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let defaults = state.config().model_config();
    let model = ModelConfig {
        model_name: request.model_name.unwrap_or(defaults.model_name),
        temperature: request.temperature.unwrap_or(defaults.temperature),
    };
    if !(0.0..=2.0).contains(&model.temperature) {
        return Err(Error::Config(format!(
            "temperature must be between 0 and 2, got {}",
            model.temperature
        )));
    }

    let session = state.session(&id)?;
    let mut session = session.lock().await;
    session.initialize(model).await?;
    Ok(Json(SessionStatus::of(id, &session)))
}

/// DELETE /api/sessions/:id/memory - Forget the conversation
pub async fn clear_memory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>> {
    let session = state.session(&id)?;
    let mut session = session.lock().await;
    session.clear_memory()?;
    Ok(Json(SessionStatus::of(id, &session)))
}

/// GET /api/sessions/:id/history - Conversation so far
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>> {
    let session = state.session(&id)?;
    let session = session.lock().await;

    let turns = session
        .memory()
        .map(|memory| {
            memory
                .turns()
                .map(|turn| HistoryTurn {
                    role: turn.role,
                    text: turn.text.clone(),
                    sources: turn
                        .sources
                        .iter()
                        .enumerate()
                        .map(|(i, chunk)| Citation::from_chunk(i + 1, chunk))
                        .collect(),
                    created_at: turn.created_at,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(HistoryResponse { session_id: id, turns }))
}
