//! Document Q&A server binary
//!
//! Run with: cargo run -p docqa-rag --bin docqa-rag-server

use docqa_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      DocQA RAG Server                     ║
║         PDF Question Answering with Page Citations        ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Completion: {:?} / {}", config.llm.provider, config.llm.model_name);
    tracing::info!("  - Embeddings: {:?} / {}", config.embeddings.provider, config.embeddings.model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Index: {}", config.index.storage_path.display());
    match &config.ingestion.folder_root {
        Some(root) => tracing::info!("  - Folder ingestion root: {}", root.display()),
        None => tracing::info!("  - Folder ingestion: disabled"),
    }

    let server = RagServer::new(config)?;

    match server.state().llm().health_check().await {
        Ok(true) => tracing::info!("Completion provider is reachable"),
        _ => tracing::warn!(
            "Completion provider {} is not reachable; questions will fail until it is",
            server.state().llm().name()
        ),
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
