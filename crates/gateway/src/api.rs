//! HTTP API for the tutor.
//!
//! Endpoints:
//!
//! - `POST   /api/chat`               — Ask the tutor a question
//! - `GET    /api/profile/{user_id}`  — Learner profile (created on first access)
//! - `PUT    /api/profile/{user_id}`  — Select the learner's level
//! - `DELETE /api/session/{user_id}`  — Forget the conversation

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use pycoach_core::level::{AdaptiveProfile, Level};
use pycoach_tutor::{ChatRequest, ChatResponse, Tutor, TutorError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state for the API.
pub struct ApiState {
    pub tutor: Tutor,
}

pub type SharedApiState = Arc<ApiState>;

pub fn api_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/profile/{user_id}", get(get_profile_handler).put(set_level_handler))
        .route("/session/{user_id}", axum::routing::delete(reset_session_handler))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// A [`TutorError`] rendered as an HTTP response.
pub struct ApiError(TutorError);

impl From<TutorError> for ApiError {
    fn from(error: TutorError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            warn!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(
        user_id = %payload.user_id,
        backend = payload.llm_source.as_str(),
        message_len = payload.message.len(),
        "Chat request"
    );
    let response = state.tutor.chat(payload).await?;
    Ok(Json(response))
}

async fn get_profile_handler(
    State(state): State<SharedApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<AdaptiveProfile>, ApiError> {
    Ok(Json(state.tutor.profile(&user_id).await?))
}

#[derive(Debug, Deserialize)]
struct SetLevelRequest {
    current_level: String,
}

async fn set_level_handler(
    State(state): State<SharedApiState>,
    Path(user_id): Path<String>,
    Json(payload): Json<SetLevelRequest>,
) -> Result<Json<AdaptiveProfile>, ApiError> {
    let level = Level::parse(&payload.current_level);
    Ok(Json(state.tutor.set_level(&user_id, level).await?))
}

async fn reset_session_handler(State(state): State<SharedApiState>, Path(user_id): Path<String>) -> Response {
    if state.tutor.reset_session(&user_id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No session for '{user_id}'"),
                kind: "not_found".into(),
            }),
        )
            .into_response()
    }
}
