//! HTTP server for the Q&A system

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Document Q&A HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server with the providers selected in `config`
    pub fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    /// Create a server around existing state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .nest("/api", routes::api_routes(self.config.server.max_upload_size))
            .with_state(self.state.clone())
            // Middleware layers (order matters - applied bottom to top)
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting Q&A server on http://{}", addr);
        tracing::info!("API documentation: http://{}/api/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
