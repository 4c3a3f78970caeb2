use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::core::error::{Rejection, SynthesisError};

/// Application error type
#[derive(Debug)]
pub enum AppError {
    InternalServerError(String),
    BadRequest(String),
    /// The remote model refused the content.
    Unprocessable(String),
    /// The remote service failed or rejected the turn.
    BadGateway(String),
    /// The request was abandoned before it finished.
    ServiceUnavailable(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                msg
            }
            AppError::Unprocessable(msg) => {
                tracing::warn!("Unprocessable: {}", msg);
                msg
            }
            AppError::BadGateway(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                msg
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                msg
            }
        };

        let body = Json(json!({
            "error": error_message,
            "response": null
        }));

        (status, body).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            AppError::Unprocessable(msg) => write!(f, "Unprocessable: {msg}"),
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {msg}"),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<SynthesisError> for AppError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::RemoteRejection(Rejection::ContentFilter) => {
                AppError::Unprocessable(Rejection::ContentFilter.to_string())
            }
            SynthesisError::RemoteRejection(Rejection::Remote(message)) => {
                AppError::BadGateway(message)
            }
            e @ SynthesisError::Transport(_) => AppError::BadGateway(e.to_string()),
            e @ SynthesisError::Cancelled => AppError::ServiceUnavailable(e.to_string()),
            e @ (SynthesisError::Storage(_) | SynthesisError::Protocol(_)) => {
                AppError::InternalServerError(e.to_string())
            }
        }
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
