use std::sync::Arc;

use crate::config::Config;
use crate::extraction::ExtractionPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Immutable after startup; one pipeline serves every request.
    pub pipeline: Arc<ExtractionPipeline>,
    pub config: Config,
}
