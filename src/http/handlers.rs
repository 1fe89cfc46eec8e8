use super::state::AppState;
use crate::error::VoiceError;
use crate::sequencer::Ticket;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    /// Whether the action changed anything
    pub accepted: bool,

    /// Ticket of the backend request the action started, if any
    pub ticket: Option<Ticket>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn accepted(ticket: Option<Ticket>) -> Response {
    (
        StatusCode::OK,
        Json(ActionResponse {
            accepted: ticket.is_some(),
            ticket,
        }),
    )
        .into_response()
}

fn flag(accepted: bool) -> Response {
    (
        StatusCode::OK,
        Json(ActionResponse {
            accepted,
            ticket: None,
        }),
    )
        .into_response()
}

/// Map a session failure onto a status code and its user-facing message
fn error_response(err: VoiceError) -> Response {
    let status = match &err {
        VoiceError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        VoiceError::Busy(_) | VoiceError::Unsupported(_) => StatusCode::CONFLICT,
        VoiceError::NetworkFailure { .. }
        | VoiceError::MalformedResponse(_)
        | VoiceError::PlaybackRejected(_) => StatusCode::BAD_GATEWAY,
        VoiceError::Unavailable(_) => StatusCode::NOT_FOUND,
        VoiceError::SessionClosed => StatusCode::SERVICE_UNAVAILABLE,
        VoiceError::Audio(_) | VoiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Voice action failed: {}", err);
    } else {
        warn!("Voice action refused: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /voice/speak/start
/// Open the microphone (barges in on playback)
pub async fn start_speaking(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.start_speaking().await {
        Ok(()) => flag(true),
        Err(e) => error_response(e),
    }
}

/// POST /voice/speak/stop
/// Close the microphone and send the recording
pub async fn stop_speaking(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.stop_speaking().await {
        Ok(ticket) => accepted(ticket),
        Err(e) => error_response(e),
    }
}

/// POST /voice/text
/// Send a typed message
pub async fn send_text(
    State(state): State<AppState>,
    Json(req): Json<SendTextRequest>,
) -> impl IntoResponse {
    info!("Text message ({} chars)", req.text.chars().count());
    match state.session.send_text(req.text).await {
        Ok(ticket) => accepted(ticket),
        Err(e) => error_response(e),
    }
}

/// POST /voice/lesson/start
pub async fn start_lesson(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.start_lesson().await {
        Ok(ticket) => accepted(ticket),
        Err(e) => error_response(e),
    }
}

/// POST /voice/lesson/continue
/// Ask for the next lesson segment
pub async fn continue_lesson(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.continue_lesson().await {
        Ok(ticket) => accepted(ticket),
        Err(e) => error_response(e),
    }
}

/// POST /voice/interrupt
pub async fn interrupt(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.interrupt().await {
        Ok(paused) => flag(paused),
        Err(e) => error_response(e),
    }
}

/// POST /voice/resume
pub async fn resume(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.resume().await {
        Ok(resumed) => flag(resumed),
        Err(e) => error_response(e),
    }
}

/// GET /voice/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /voice/transcript
/// Transcript accumulated so far
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.transcript().await {
        Ok(transcript) => (StatusCode::OK, Json(transcript)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
