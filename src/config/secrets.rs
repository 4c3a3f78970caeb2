//! Environment bootstrap from Google Secret Manager.
//!
//! The secret `<prefix>--<env>` holds a JSON object; every string-valued
//! entry is read by the configuration merge as if it were an environment
//! variable of the same name, ahead of the real environment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::core::providers::google::{
    CLOUD_PLATFORM_SCOPE, GoogleAuthClient, GoogleError, TokenProvider,
};

pub const SECRET_MANAGER_API_BASE: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Fetches the latest version of a secret and decodes it as a flat map.
pub struct SecretLoader {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    api_base: String,
}

impl SecretLoader {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Result<Self, GoogleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GoogleError::ConfigurationError(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            tokens,
            api_base: SECRET_MANAGER_API_BASE.to_string(),
        })
    }

    /// Build a loader backed by Google credentials (`None` selects ADC).
    pub fn from_credentials(credentials: Option<&str>) -> Result<Self, GoogleError> {
        let auth = GoogleAuthClient::from_setting(credentials, &[CLOUD_PLATFORM_SCOPE])?;
        Self::new(Arc::new(auth))
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn secret_name(prefix: &str, environment: &str) -> String {
        format!("{prefix}--{environment}")
    }

    pub fn access_url(&self, project_id: &str, secret: &str) -> String {
        format!(
            "{}/projects/{project_id}/secrets/{secret}/versions/latest:access",
            self.api_base
        )
    }

    /// Fetch and decode one secret.
    pub async fn fetch(
        &self,
        project_id: &str,
        secret: &str,
    ) -> Result<HashMap<String, String>, GoogleError> {
        let token = self.tokens.get_token().await?;
        let response = self
            .http
            .get(self.access_url(project_id, secret))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GoogleError::from_response_body(status.as_u16(), &body));
        }

        let access: AccessResponse = serde_json::from_str(&body).map_err(|e| {
            GoogleError::ApiError {
                status: status.as_u16(),
                message: format!("unexpected access response: {e}"),
            }
        })?;
        decode_payload(&access.payload.data)
    }

    /// Fetch `<prefix>--<environment>`; failures are logged and yield an empty map.
    pub async fn load(
        &self,
        project_id: &str,
        prefix: &str,
        environment: &str,
    ) -> HashMap<String, String> {
        let secret = Self::secret_name(prefix, environment);
        match self.fetch(project_id, &secret).await {
            Ok(values) => {
                info!(secret = %secret, count = values.len(), "Loaded secrets");
                values
            }
            Err(e) => {
                error!(secret = %secret, "Failed to load secrets: {}", e);
                HashMap::new()
            }
        }
    }
}

/// Decode a base64 payload holding a JSON object; non-string values are skipped.
pub fn decode_payload(data: &str) -> Result<HashMap<String, String>, GoogleError> {
    let raw = BASE64
        .decode(data.trim())
        .map_err(|e| GoogleError::ConfigurationError(format!("secret payload is not base64: {e}")))?;

    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&raw)
        .map_err(|e| {
            GoogleError::ConfigurationError(format!("secret payload is not a JSON object: {e}"))
        })?;

    let mut values = HashMap::with_capacity(object.len());
    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                values.insert(key, s);
            }
            _ => warn!(key = %key, "Skipping non-string secret value"),
        }
    }
    Ok(values)
}
