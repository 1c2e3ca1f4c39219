mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::providers::TargetSource;
use crate::scoring::ScoringPipeline;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub targets: Arc<dyn TargetSource>,
    pub pipeline: ScoringPipeline,
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Targets
        .route("/targets/random", post(handlers::random_target))
        .route("/targets/{id}", get(handlers::get_target))
        // Sessions
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/unfinished", get(handlers::unfinished_session))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/note", post(handlers::append_note))
        .route("/sessions/{id}/finish", post(handlers::finish_session))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
