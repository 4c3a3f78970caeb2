//! Google Cloud API error types shared by the storage backend and the secret
//! loader.

/// Error types for Google Cloud REST operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GoogleError {
    /// Credentials could not be loaded or a token could not be minted.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid credential source, bucket name, project, etc.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The request never produced an HTTP response.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

impl GoogleError {
    /// Builds an `ApiError`, pulling `error.message` out of Google's JSON error
    /// envelope when present.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().to_string());
        Self::ApiError { status, message }
    }

    /// 404 from the API.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }
}

impl From<reqwest::Error> for GoogleError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::ApiError {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Self::NetworkError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let auth_err = GoogleError::AuthenticationFailed("Invalid token".to_string());
        assert_eq!(auth_err.to_string(), "Authentication failed: Invalid token");

        let api_err = GoogleError::ApiError {
            status: 403,
            message: "Forbidden".to_string(),
        };
        assert_eq!(api_err.to_string(), "API error (403): Forbidden");
    }

    #[test]
    fn test_from_response_body_extracts_google_message() {
        let body = r#"{"error":{"code":403,"message":"caller does not have storage.objects.create access","errors":[]}}"#;
        match GoogleError::from_response_body(403, body) {
            GoogleError::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "caller does not have storage.objects.create access");
            }
            other => panic!("Expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_body_falls_back_to_raw_text() {
        let err = GoogleError::from_response_body(404, "Not Found\n");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "API error (404): Not Found");
    }
}
