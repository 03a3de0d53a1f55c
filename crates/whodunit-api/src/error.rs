//! Whodunit: API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use whodunit_core::error::DomainError;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Error details in a failed response.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error kind.
    pub kind: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// What went wrong.
    pub error: ErrorDetail,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::SessionNotFound(_) | DomainError::ScriptNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DomainError::UnknownCharacter(_)
            | DomainError::UnknownPlayer(_)
            | DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DomainError::AlreadyAssigned { .. }
            | DomainError::AlreadyJoined(_)
            | DomainError::InvalidTransition(_) => StatusCode::CONFLICT,
            DomainError::QuotaExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::SessionBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            DomainError::Persistence(detail) => {
                error!(detail = %detail, "request failed on persistence");
                "the session could not be stored, try again later".to_owned()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                kind: self.0.kind(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use uuid::Uuid;

    fn status_of(err: DomainError) -> StatusCode {
        let response = ApiError(err).into_response();
        response.status()
    }

    #[test]
    fn test_session_not_found_maps_to_404() {
        assert_eq!(
            status_of(DomainError::SessionNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_already_assigned_maps_to_409() {
        assert_eq!(
            status_of(DomainError::AlreadyAssigned {
                character_id: "butler".into(),
                player_id: "alice".into(),
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_quota_exceeded_maps_to_422() {
        assert_eq!(
            status_of(DomainError::QuotaExceeded {
                character_id: "cook".into(),
                act_number: 1,
                limit: 3,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_session_busy_maps_to_503() {
        assert_eq!(
            status_of(DomainError::SessionBusy(Uuid::new_v4())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        assert_eq!(
            status_of(DomainError::InvalidInput("bad input".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_persistence_error_hides_details() {
        // Arrange
        let error = ApiError(DomainError::Persistence("password=hunter2 rejected".into()));

        // Act
        let response = error.into_response();

        // Assert
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "persistence");
        assert!(!json["error"]["message"].as_str().unwrap().contains("hunter2"));
    }
}
