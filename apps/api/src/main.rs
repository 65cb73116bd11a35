mod config;
mod documents;
mod errors;
mod llm_client;
mod qa;
mod retrieval;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::retrieval::embedder::OpenAiEmbedder;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DocQA API v{}", env!("CARGO_PKG_VERSION"));

    // Credential is checked here, not on the first request
    let llm = LlmClient::new(&config.llm)?;
    info!("LLM client initialized (model: {})", llm.model());

    let embedder = Arc::new(OpenAiEmbedder::new(&config.llm)?);
    info!("Embedder initialized (model: {})", config.llm.embedding_model);

    info!(
        "Retry policy: {} attempts, backoff {}s..{}s",
        config.llm.retry.max_attempts,
        config.llm.retry.min_delay.as_secs(),
        config.llm.retry.max_delay.as_secs()
    );

    let state = AppState {
        llm,
        embedder,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
