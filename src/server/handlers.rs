//! HTTP handlers

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::storage::{HistoryEntry, SessionSummary};

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TitleUpdate {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn success() -> Json<Self> {
        Json(Self {
            status: "success".to_string(),
        })
    }
}

/// `POST /chat`: stream the model reply as plain text
///
/// Errors raised before the first fragment become a JSON error response.
/// An error in the middle of the body aborts the connection.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let fragments = state
        .relay
        .stream_reply(&payload.session_id, &payload.message)
        .await?;

    let session_id = payload.session_id;
    let stream = fragments.map(move |item| {
        if let Err(e) = &item {
            tracing::warn!("Aborting chat stream for {}: {}", session_id, e);
        }
        item
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `GET /history/:session_id`
pub async fn history_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Vec<HistoryEntry>> {
    Json(state.store.get_chat_history(&session_id).await)
}

/// `GET /sessions`
pub async fn sessions_handler(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.store.get_all_sessions().await)
}

/// `DELETE /sessions/:session_id`
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    if state.store.delete_session(&session_id).await {
        Ok(StatusResponse::success())
    } else {
        Err(ApiError::OperationFailed("Failed to delete session"))
    }
}

/// `PATCH /sessions/:session_id/title`
pub async fn update_title_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<TitleUpdate>,
) -> Result<Json<StatusResponse>, ApiError> {
    if state.store.update_title(&session_id, &payload.title).await {
        Ok(StatusResponse::success())
    } else {
        Err(ApiError::OperationFailed("Failed to update title"))
    }
}
