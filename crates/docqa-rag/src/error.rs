//! Error types for the document Q&A pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Embed,
    Synthesize,
    Index,
    Session,
    Config,
    Internal,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Embed => "embed",
            Stage::Synthesize => "synthesize",
            Stage::Index => "index",
            Stage::Session => "session",
            Stage::Config => "config",
            Stage::Internal => "internal",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document Q&A errors
#[derive(Debug, Error)]
pub enum Error {
    /// Source bytes are not a well-formed document of the expected format
    #[error("[load] failed to load '{source_name}': {message}")]
    Load { source_name: String, message: String },

    /// Remote embedding call failed or returned a malformed response
    #[error("[embed] embedding failed: {0}")]
    Embedding(String),

    /// Remote completion call failed or returned a malformed response
    #[error("[synthesize] answer generation failed: {0}")]
    Synthesis(String),

    /// No persisted index snapshot at the given location
    #[error("[index] no index snapshot found at {0}")]
    NotFound(String),

    /// Ingestion produced nothing to index
    #[error("[index] nothing to index: {0}")]
    EmptyInput(String),

    /// Query issued before the session was initialized
    #[error("[session] session is not ready: {0}")]
    NotReady(String),

    /// No session registered under this id
    #[error("[session] unknown session {0}")]
    UnknownSession(String),

    /// Vectors or indexes that cannot be combined (model, metric or dimensions differ)
    #[error("[index] incompatible index data: {0}")]
    IndexMismatch(String),

    /// Snapshot corruption or other index failures
    #[error("[index] {0}")]
    Index(String),

    /// Configuration error
    #[error("[config] {0}")]
    Config(String),

    /// Request refused by deployment policy
    #[error("[config] not permitted: {0}")]
    Forbidden(String),

    /// IO error
    #[error("[internal] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("[internal] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error not attributed to a specific stage
    #[error("[internal] HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("[internal] {0}")]
    Internal(String),
}

impl Error {
    /// Create a load error for one source document
    pub fn load(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a synthesis error
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis(message.into())
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The pipeline stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            Error::Load { .. } => Stage::Load,
            Error::Embedding(_) => Stage::Embed,
            Error::Synthesis(_) => Stage::Synthesize,
            Error::NotFound(_)
            | Error::EmptyInput(_)
            | Error::IndexMismatch(_)
            | Error::Index(_) => Stage::Index,
            Error::NotReady(_) | Error::UnknownSession(_) => Stage::Session,
            Error::Config(_) | Error::Forbidden(_) => Stage::Config,
            Error::Io(_) | Error::Json(_) | Error::Http(_) | Error::Internal(_) => Stage::Internal,
        }
    }

    /// Expected conditions the caller recovers from by ingesting or initializing
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NotReady(_) | Error::NotFound(_) | Error::EmptyInput(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Load { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "load_error"),
            Error::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            Error::Synthesis(_) => (StatusCode::BAD_GATEWAY, "synthesis_error"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::EmptyInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "empty_input"),
            Error::NotReady(_) => (StatusCode::CONFLICT, "not_ready"),
            Error::UnknownSession(_) => (StatusCode::NOT_FOUND, "unknown_session"),
            Error::IndexMismatch(_) => (StatusCode::CONFLICT, "index_mismatch"),
            Error::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "stage": self.stage(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
