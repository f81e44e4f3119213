//! Webhook request handlers: translate "call-started" / "call-ended" /
//! "status" into Session Manager calls.

use super::types::{
    CallEndedRequest, CallEndedResponse, CallStartedRequest, CallStartedResponse, ErrorResponse,
    HealthResponse,
};
use super::AppState;
use crate::session::SessionError;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the webhook router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/call-started", post(call_started))
        .route("/webhook/call-ended", post(call_ended))
        .route("/status", get(status))
        .route("/health", get(health))
        .with_state(state)
}

async fn call_started(
    State(state): State<AppState>,
    Json(body): Json<CallStartedRequest>,
) -> Result<Json<CallStartedResponse>, AppError> {
    if body.call_id.trim().is_empty() {
        return Err(AppError::BadRequest("missing call_id".to_string()));
    }

    let caller_phone = body.from.unwrap_or_default();

    state
        .sessions
        .start(body.call_id.clone(), caller_phone.clone())
        .await
        .map_err(|e| match e {
            SessionError::AlreadyExists(id) => AppError::Conflict(format!("duplicate call_id: {id}")),
            other => AppError::Internal(other.to_string()),
        })?;

    Ok(Json(CallStartedResponse {
        status: "success",
        call_id: body.call_id,
        caller_phone,
    }))
}

async fn call_ended(
    State(state): State<AppState>,
    Json(body): Json<CallEndedRequest>,
) -> Result<Json<CallEndedResponse>, AppError> {
    state
        .sessions
        .stop(&body.call_id)
        .await
        .map_err(|e| match e {
            SessionError::NotFound(id) => AppError::NotFound(format!("unknown call_id: {id}")),
            other => AppError::Internal(other.to_string()),
        })?;

    Ok(Json(CallEndedResponse { status: "success" }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.status().await)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
