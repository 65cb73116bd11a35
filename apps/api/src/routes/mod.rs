pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::qa::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/documents/parse", post(handlers::handle_parse))
        .route("/api/v1/qa/search", post(handlers::handle_search))
        .route("/api/v1/qa/full", post(handlers::handle_full_content))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
