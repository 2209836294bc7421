//! Router setup and the state shared by all handlers.
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::storage::{GENERATED_PREFIX, UPLOADS_PREFIX};
use crate::upload::UploadValidator;

// Room for the multipart framing and text fields around the image.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Immutable after startup; one `Arc` is cloned into every request.
pub struct AppState {
    pub config: Config,
    pub orchestrator: Orchestrator,
    pub validator: UploadValidator,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let orchestrator = Orchestrator::new(&config);
        AppState { config, orchestrator, validator: UploadValidator::default() }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let store = state.orchestrator.store();
    let body_limit = state.validator.max_bytes() as usize + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload))
        .route("/generate-simple", post(handlers::generate_simple))
        .route("/generate", post(handlers::generate))
        .nest_service(UPLOADS_PREFIX, ServeDir::new(store.uploads_dir()))
        .nest_service(GENERATED_PREFIX, ServeDir::new(store.generated_dir()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
