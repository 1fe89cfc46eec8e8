use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session queries
        .route("/voice/status", get(handlers::get_status))
        .route("/voice/transcript", get(handlers::get_transcript))
        // Capture
        .route("/voice/speak/start", post(handlers::start_speaking))
        .route("/voice/speak/stop", post(handlers::stop_speaking))
        .route("/voice/text", post(handlers::send_text))
        // Lesson
        .route("/voice/lesson/start", post(handlers::start_lesson))
        .route("/voice/lesson/continue", post(handlers::continue_lesson))
        // Playback
        .route("/voice/interrupt", post(handlers::interrupt))
        .route("/voice/resume", post(handlers::resume))
        // Request logging; the UI shell is served from another origin
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
