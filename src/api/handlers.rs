//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ErrorResponse, QueuedResponse, UiEventRequest};
use super::AppState;
use crate::runtime::SessionSnapshot;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Current snapshot
        .route("/api/session", get(get_session))
        // UI gestures
        .route("/api/session/events", post(post_event))
        // Snapshot stream
        .route("/api/session/stream", get(stream_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

async fn post_event(
    State(state): State<AppState>,
    payload: Result<Json<UiEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let event = request.into_event().map_err(AppError::BadRequest)?;

    tracing::debug!(event = event.name(), "UI event");
    state
        .session
        .send(event)
        .await
        .map_err(AppError::Unavailable)?;

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

async fn stream_session(State(state): State<AppState>) -> impl IntoResponse {
    sse_stream(state.session.subscribe())
}

async fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
