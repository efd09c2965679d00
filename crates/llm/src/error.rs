use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Relay errors with appropriate HTTP status codes.
///
/// Anything that goes wrong on a per-frame basis during streaming is not an
/// error at this level: malformed upstream frames are logged and skipped,
/// and a missing finish reason is recovered by synthesizing one.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Inbound request body could not be understood.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network or connection error reaching the upstream.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ConnectionError(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response body.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::ConnectionError(_) => "api_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response in the Messages API error shape.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    #[serde(rename = "type")]
    response_type: &'static str,
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    #[serde(rename = "type")]
    error_type: &'static str,
    message: String,
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = ErrorResponse {
            response_type: "error",
            error: ErrorDetails {
                error_type: self.error_type(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}
