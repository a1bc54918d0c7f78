use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/recordings", get(handlers::list_recordings))
        .route("/recordings/start", post(handlers::start_recording))
        .route(
            "/recordings/:session_id/finish",
            post(handlers::finish_recording),
        )
        .route(
            "/recordings/:session_id/cancel",
            post(handlers::cancel_recording),
        )
        // Session queries
        .route(
            "/recordings/:session_id/status",
            get(handlers::get_recording_status),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
