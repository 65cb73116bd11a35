use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::retrieval::embedder::Embedder;

/// Shared application state injected into all route handlers via Axum extractors.
/// Holds no per-request data; every upload is processed and dropped within its request.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    /// Pluggable embedding backend. Default: OpenAiEmbedder.
    pub embedder: Arc<dyn Embedder>,
    pub config: Config,
}
