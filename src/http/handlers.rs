use super::state::AppState;
use crate::audio::InputSource;
use crate::capture::{
    generate_session_id, CaptureSession, FinishedRecording, SessionConfig, SessionStats,
};
use crate::error::CaptureError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartRecordingRequest {
    /// Optional session ID (if not provided, generate one)
    pub session_id: Option<String>,

    /// Replay this WAV file instead of capturing from the microphone
    pub input_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: String,
    pub status: String,
    pub output_path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct FinishRecordingResponse {
    pub session_id: String,
    pub status: String,
    pub recording: FinishedRecording,
}

#[derive(Debug, Serialize)]
pub struct CancelRecordingResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn capture_error_status(err: &CaptureError) -> StatusCode {
    match err {
        CaptureError::InvalidState { .. } => StatusCode::CONFLICT,
        CaptureError::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
        CaptureError::DeviceOpen(_) | CaptureError::DeviceStart(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Drop a session from the registry once it reaches a terminal state
///
/// Sessions still starting or recording stay registered, so a rejected
/// finish or cancel does not orphan them.
async fn forget_if_ended(state: &AppState, session_id: &str, session: &Arc<CaptureSession>) {
    if session.state().is_terminal() {
        let mut sessions = state.sessions.write().await;
        if sessions
            .get(session_id)
            .map_or(false, |registered| Arc::ptr_eq(registered, session))
        {
            sessions.remove(session_id);
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recordings/start
/// Start a new capture session
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> Response {
    let session_id = req.session_id.unwrap_or_else(generate_session_id);

    info!("Starting recording: {}", session_id);

    let config = match SessionConfig::for_session(&state.recordings_dir, session_id.clone()) {
        Ok(config) => config.with_format(state.format),
        Err(e) => {
            error!("Rejected recording request: {}", e);
            return error_response(capture_error_status(&e), e.to_string());
        }
    };
    let output_path = config.output_path.clone();
    let session = Arc::new(CaptureSession::new(config));

    // Reserve the id; the lock is released before the device is touched
    {
        let mut sessions = state.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return error_response(
                StatusCode::CONFLICT,
                format!("Recording {} is already active", session_id),
            );
        }
        sessions.insert(session_id.clone(), Arc::clone(&session));
    }

    let source = match req.input_file {
        Some(path) => InputSource::File(path),
        None => InputSource::Microphone,
    };
    let device = (state.device_factory)(&source);

    // Detached so a dropped request cannot abandon a half-opened device
    let starting = {
        let sessions = Arc::clone(&state.sessions);
        let session_id = session_id.clone();
        tokio::spawn(async move {
            let result = session.start(device).await;
            if result.is_err() {
                sessions.write().await.remove(&session_id);
            }
            result
        })
    };

    let result = starting
        .await
        .unwrap_or_else(|e| Err(CaptureError::TaskFailed(e.to_string())));
    if let Err(e) = result {
        error!("Failed to start recording {}: {}", session_id, e);
        return error_response(
            capture_error_status(&e),
            format!("Failed to start recording: {}", e),
        );
    }

    info!("Recording started: {}", session_id);

    (
        StatusCode::OK,
        Json(StartRecordingResponse {
            session_id,
            status: "recording".to_string(),
            output_path,
        }),
    )
        .into_response()
}

/// POST /recordings/:session_id/finish
/// Finalize the WAV file and hand it off
pub async fn finish_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    info!("Finishing recording: {}", session_id);

    let session = state.sessions.read().await.get(&session_id).cloned();

    let Some(session) = session else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Recording {} not found", session_id),
        );
    };

    let finished = session.finish().await;
    forget_if_ended(&state, &session_id, &session).await;

    let recording = match finished {
        Ok(recording) => recording,
        Err(e) => {
            error!("Failed to finish recording {}: {}", session_id, e);
            return error_response(
                capture_error_status(&e),
                format!("Failed to finish recording: {}", e),
            );
        }
    };

    if let Err(e) = state.handler.on_recorded(&recording).await {
        error!("Failed to hand off recording {}: {:#}", session_id, e);
        return error_response(
            StatusCode::BAD_GATEWAY,
            format!("Recording finalized but hand-off failed: {:#}", e),
        );
    }

    (
        StatusCode::OK,
        Json(FinishRecordingResponse {
            session_id,
            status: "completed".to_string(),
            recording,
        }),
    )
        .into_response()
}

/// POST /recordings/:session_id/cancel
/// Stop capturing and discard the file
pub async fn cancel_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    info!("Cancelling recording: {}", session_id);

    let session = state.sessions.read().await.get(&session_id).cloned();

    let Some(session) = session else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Recording {} not found", session_id),
        );
    };

    let cancelled = session.cancel().await;
    forget_if_ended(&state, &session_id, &session).await;

    if let Err(e) = cancelled {
        error!("Failed to cancel recording {}: {}", session_id, e);
        return error_response(
            capture_error_status(&e),
            format!("Failed to cancel recording: {}", e),
        );
    }

    if let Err(e) = state.handler.on_cancelled(&session_id).await {
        error!("Cancellation handler failed for {}: {:#}", session_id, e);
    }

    (
        StatusCode::OK,
        Json(CancelRecordingResponse {
            session_id,
            status: "cancelled".to_string(),
        }),
    )
        .into_response()
}

/// GET /recordings/:session_id/status
/// Get status of a capture session
pub async fn get_recording_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(session) => (StatusCode::OK, Json(session.get_stats().await)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Recording {} not found", session_id),
        ),
    }
}

/// GET /recordings
/// List registered capture sessions (starting or recording)
pub async fn list_recordings(State(state): State<AppState>) -> Json<Vec<SessionStats>> {
    let sessions = state.sessions.read().await;

    let mut stats = Vec::with_capacity(sessions.len());
    for session in sessions.values() {
        stats.push(session.get_stats().await);
    }
    stats.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Json(stats)
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
