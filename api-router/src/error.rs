use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Upstream failure: {0}")]
    BadGateway(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::UnsupportedFileType(_) => Self::UnsupportedMediaType(err.to_string()),
            AppError::FileTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            AppError::ParseFailure(_) | AppError::Validation(_) => {
                Self::ValidationError(err.to_string())
            }
            AppError::SessionNotFound(_) => Self::NotFound(err.to_string()),
            AppError::EmbeddingFailure(_) | AppError::GenerationFailure(_) => {
                tracing::error!("Upstream model error: {:?}", err);
                Self::BadGateway(err.to_string())
            }
            _ => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::InternalError(message)
            | Self::ValidationError(message)
            | Self::NotFound(message)
            | Self::UnsupportedMediaType(message)
            | Self::PayloadTooLarge(message)
            | Self::BadGateway(message) => message,
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                status: "error".to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn app_errors_map_to_status_codes() {
        let cases = [
            (
                AppError::UnsupportedFileType("photo.png".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                AppError::FileTooLarge { size: 10, limit: 5 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (AppError::ParseFailure("bad pdf".into()), StatusCode::BAD_REQUEST),
            (AppError::Validation("empty".into()), StatusCode::BAD_REQUEST),
            (AppError::SessionNotFound("abc".into()), StatusCode::NOT_FOUND),
            (AppError::EmbeddingFailure("down".into()), StatusCode::BAD_GATEWAY),
            (AppError::GenerationFailure("down".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::DimensionMismatch {
                    expected: 2,
                    actual: 3,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (app_error, expected) in cases {
            assert_status_code(ApiError::from(app_error), expected);
        }
    }

    #[test]
    fn session_not_found_keeps_its_message() {
        let api_error = ApiError::from(AppError::SessionNotFound("abc".into()));

        assert!(matches!(api_error, ApiError::NotFound(msg) if msg.contains("abc")));
    }

    #[test]
    fn internal_errors_are_sanitized() {
        let api_error = ApiError::from(AppError::Io(std::io::Error::other(
            "/secret/path unreadable",
        )));

        match api_error {
            ApiError::InternalError(message) => {
                assert_eq!(message, "Internal server error");
            }
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[test]
    fn display_messages() {
        let error = ApiError::ValidationError("invalid data format".to_string());
        assert_eq!(error.to_string(), "Validation error: invalid data format");

        let error = ApiError::InternalError("db password incorrect".to_string());
        assert_eq!(error.to_string(), "Internal server error");
    }
}
