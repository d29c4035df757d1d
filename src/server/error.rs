//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::RelayError;

/// Error returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// A relay failure; status and code follow the error kind
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// A store write reported failure; rendered as `{"detail": ..}`
    #[error("{0}")]
    OperationFailed(&'static str),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Relay(RelayError::UpstreamUnavailable(_))
            | Self::Relay(RelayError::StreamInterrupted(_)) => StatusCode::BAD_GATEWAY,
            Self::Relay(RelayError::UpstreamTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Relay(_) | Self::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Body of a failed store write
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            ApiError::OperationFailed(detail) => {
                tracing::error!(detail, "Store operation failed");
                (status, Json(DetailResponse { detail })).into_response()
            }
            ApiError::Relay(err) => {
                let code = err.code();
                let message = err.to_string();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error_code = code, message = %message, "API error");
                } else {
                    tracing::warn!(error_code = code, message = %message, "Upstream error");
                }
                (
                    status,
                    Json(ErrorResponse {
                        error: message,
                        code,
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_relay_errors_map_to_distinct_statuses() {
        let unavailable: ApiError = RelayError::UpstreamUnavailable("refused".into()).into();
        let timeout: ApiError = RelayError::UpstreamTimeout("slow".into()).into();
        let storage: ApiError = RelayError::Storage("locked".into()).into();

        assert_eq!(unavailable.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_uses_relay_error_code() {
        let response = ApiError::from(RelayError::Storage("locked".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "storage");
        assert_eq!(json["error"], "Storage error: locked");
    }

    #[test]
    fn test_interrupted_stream_before_reply_is_bad_gateway() {
        let err: ApiError = RelayError::StreamInterrupted("blocked".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_operation_failed_response_status() {
        let response = ApiError::OperationFailed("Failed to delete session").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
