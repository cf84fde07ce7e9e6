//! Admin HTTP API.
//!
//! Exposes the maintenance operations next to the few application routes
//! that touch projection rows, so both sides share one maintenance gate.

mod error;
mod handlers;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use peopledesk_core::Database;

pub use error::ApiError;

pub fn create_router(db: Database) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/users/{id}/progress", get(handlers::list_progress))
        .route(
            "/api/users/{user_id}/progress/{item_id}",
            patch(handlers::update_progress),
        )
        .route(
            "/api/maintenance/checklist-progress",
            post(handlers::rebuild_checklist_progress),
        )
        .route(
            "/api/maintenance/survey-responses",
            post(handlers::reset_survey_responses),
        )
        .route("/api/maintenance/runs", get(handlers::list_runs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(db)
}
