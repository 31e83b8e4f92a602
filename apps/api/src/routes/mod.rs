pub mod extract;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Base64 inflates by 4/3; leave room for the JSON envelope on top.
fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes / 3 * 4 + 64 * 1024
}

pub fn build_router(state: AppState) -> Router {
    let limit = body_limit(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/extract", post(extract::handle_extract))
        .route("/api/v1/extract/docx", post(extract::handle_extract_docx))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}
