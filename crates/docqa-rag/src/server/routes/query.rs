//! Question answering endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::Citation;

/// Question for a ready session
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Answer with the passages it was grounded on
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Citation>,
    pub processing_time_ms: u64,
}

/// POST /api/sessions/:id/ask - Answer a question from the session's documents
pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();
    let question = request.question.trim();
    if question.is_empty() {
        return Err(Error::Config("question must not be empty".to_string()));
    }

    tracing::info!(session = %id, "Question: \"{}\"", question);

    let session = state.session(&id)?;
    let mut session = session.lock().await;
    let answer = session.ask(question).await?;

    Ok(Json(AskResponse {
        sources: answer.citations(),
        answer: answer.answer,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
