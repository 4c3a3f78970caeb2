//! Google Cloud credentials and access tokens.
//!
//! Credentials come from one of three places, chosen by the
//! `GOOGLE_APPLICATION_CREDENTIALS` setting:
//!
//! - unset or empty: Application Default Credentials
//! - a JSON object: inline service account key (secret managers often inject
//!   keys this way)
//! - anything else: path to a service account or authorized user file

use std::path::Path;

use google_cloud_auth::credentials::{
    Builder as CredentialsBuilder, CacheableResource, Credentials, service_account, user_account,
};
use http::Extensions;
use serde_json::Value;
use tracing::{debug, error};

use super::error::GoogleError;

/// Where credentials are loaded from.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    ApplicationDefault,
    /// Inline JSON key.
    JsonContent(String),
    /// Path to a key file.
    FilePath(String),
}

impl CredentialSource {
    /// Classify a credentials setting.
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting.map(str::trim) {
            None | Some("") => CredentialSource::ApplicationDefault,
            Some(value) if value.starts_with('{') => CredentialSource::JsonContent(value.to_string()),
            Some(value) => CredentialSource::FilePath(value.to_string()),
        }
    }

    /// Check the source before handing it to the credentials builder.
    pub fn validate(&self) -> Result<(), GoogleError> {
        match self {
            CredentialSource::ApplicationDefault => Ok(()),
            CredentialSource::JsonContent(json) => parse_key(json).map(|_| ()),
            CredentialSource::FilePath(path) => {
                if path.contains("..") {
                    return Err(GoogleError::ConfigurationError(
                        "Invalid credential file path: path traversal not allowed".to_string(),
                    ));
                }
                if !Path::new(path).exists() {
                    return Err(GoogleError::ConfigurationError(format!(
                        "Credential file not found: {path}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// The key document, for inline and file sources.
    fn load_key(&self) -> Result<Option<Value>, GoogleError> {
        match self {
            CredentialSource::ApplicationDefault => Ok(None),
            CredentialSource::JsonContent(json) => parse_key(json).map(Some),
            CredentialSource::FilePath(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    error!(error = %e, path = %path, "Failed to read credentials file");
                    GoogleError::ConfigurationError(format!(
                        "Failed to read credentials file '{path}': {e}"
                    ))
                })?;
                parse_key(&content).map(Some)
            }
        }
    }
}

fn parse_key(json: &str) -> Result<Value, GoogleError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| GoogleError::ConfigurationError(format!("Invalid credentials JSON: {e}")))?;
    if !value.is_object() {
        return Err(GoogleError::ConfigurationError(
            "Invalid credentials JSON: must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Source of OAuth2 bearer tokens for Google REST calls.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// A currently valid access token, refreshed as needed.
    async fn get_token(&self) -> Result<String, GoogleError>;
}

/// Token provider backed by `google-cloud-auth` credentials.
pub struct GoogleAuthClient {
    credentials: Credentials,
}

impl std::fmt::Debug for GoogleAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAuthClient")
            .field("credentials", &"<credentials>")
            .finish()
    }
}

impl GoogleAuthClient {
    pub fn new<S: AsRef<str>>(source: CredentialSource, scopes: &[S]) -> Result<Self, GoogleError> {
        source.validate()?;
        let scopes: Vec<String> = scopes.iter().map(|s| s.as_ref().to_string()).collect();

        let credentials = match source.load_key()? {
            None => CredentialsBuilder::default()
                .with_scopes(scopes)
                .build()
                .map_err(|e| {
                    error!(error = %e, "Failed to initialize Application Default Credentials");
                    GoogleError::AuthenticationFailed(format!(
                        "Failed to initialize Application Default Credentials: {e}"
                    ))
                })?,
            Some(key) => {
                let kind = key
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("service_account")
                    .to_string();
                match kind.as_str() {
                    "service_account" => service_account::Builder::new(key)
                        .with_access_specifier(service_account::AccessSpecifier::from_scopes(
                            scopes,
                        ))
                        .build(),
                    "authorized_user" => user_account::Builder::new(key).with_scopes(scopes).build(),
                    other => {
                        return Err(GoogleError::ConfigurationError(format!(
                            "Unsupported credential type '{other}'. \
                             Expected 'service_account' or 'authorized_user'"
                        )));
                    }
                }
                .map_err(|e| {
                    error!(error = %e, kind = %kind, "Failed to load credentials");
                    GoogleError::AuthenticationFailed(format!(
                        "Failed to load {kind} credentials: {e}"
                    ))
                })?
            }
        };

        debug!("Google Cloud credentials initialized");
        Ok(Self { credentials })
    }

    /// Shorthand for [`CredentialSource::from_setting`] + [`GoogleAuthClient::new`].
    pub fn from_setting<S: AsRef<str>>(
        setting: Option<&str>,
        scopes: &[S],
    ) -> Result<Self, GoogleError> {
        Self::new(CredentialSource::from_setting(setting), scopes)
    }
}

/// Pull the bearer token out of the headers produced by the credentials.
fn bearer_token(headers: CacheableResource<http::HeaderMap>) -> Result<String, GoogleError> {
    let header_map = match headers {
        CacheableResource::New { data, .. } => data,
        CacheableResource::NotModified => {
            return Err(GoogleError::AuthenticationFailed(
                "Credentials returned NotModified without a cached token".to_string(),
            ));
        }
    };

    header_map
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            GoogleError::AuthenticationFailed("No Authorization header in credentials".to_string())
        })?
        .to_str()
        .map_err(|e| GoogleError::AuthenticationFailed(format!("Invalid Authorization header: {e}")))?
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| {
            GoogleError::AuthenticationFailed("Authorization header is not a Bearer token".to_string())
        })
}

#[async_trait::async_trait]
impl TokenProvider for GoogleAuthClient {
    async fn get_token(&self) -> Result<String, GoogleError> {
        let headers = self
            .credentials
            .headers(Extensions::new())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch access token");
                GoogleError::AuthenticationFailed(format!("Failed to fetch access token: {e}"))
            })?;
        bearer_token(headers)
    }
}

/// Fixed-token provider for tests.
#[cfg(test)]
pub struct MockTokenProvider {
    pub token: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
impl MockTokenProvider {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            error: None,
        }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            token: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl TokenProvider for MockTokenProvider {
    async fn get_token(&self) -> Result<String, GoogleError> {
        match (&self.error, &self.token) {
            (Some(error), _) => Err(GoogleError::AuthenticationFailed(error.clone())),
            (None, Some(token)) => Ok(token.clone()),
            (None, None) => Err(GoogleError::AuthenticationFailed(
                "Mock provider not configured".to_string(),
            )),
        }
    }
}
