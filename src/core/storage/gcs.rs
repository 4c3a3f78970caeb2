//! Firebase / Google Cloud Storage backend over the JSON API.
//!
//! Objects are written with a media upload and then opened to the world with
//! an `allUsers:READER` ACL entry, which requires fine-grained (non-uniform)
//! bucket access.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use tracing::{debug, error, info};
use url::Url;

use super::{StorageBackend, StorageError, StorageResult, validate_key};
use crate::core::providers::google::{GoogleError, TokenProvider};

/// JSON API endpoint.
pub const GCS_API_BASE: &str = "https://storage.googleapis.com";

/// Host serving public objects.
pub const GCS_PUBLIC_BASE: &str = "https://storage.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GcsStorage {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    bucket: String,
    api_base: String,
    public_base: String,
}

impl std::fmt::Debug for GcsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStorage")
            .field("bucket", &self.bucket)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GcsStorage {
    pub fn new(bucket: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> StorageResult<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(StorageError::InvalidKey("bucket name is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::WriteFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            tokens,
            bucket,
            api_base: GCS_API_BASE.to_string(),
            public_base: GCS_PUBLIC_BASE.to_string(),
        })
    }

    /// Point API calls somewhere else (emulators, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn api_url(&self, segments: &[&str]) -> StorageResult<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|e| {
            StorageError::WriteFailed(format!("invalid API base {:?}: {e}", self.api_base))
        })?;
        url.path_segments_mut()
            .map_err(|_| StorageError::WriteFailed("API base cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn upload_url(&self, key: &str) -> StorageResult<Url> {
        let mut url = self.api_url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    /// The object name is a single path segment here, so `/` is escaped.
    fn acl_url(&self, key: &str) -> StorageResult<Url> {
        self.api_url(&["storage", "v1", "b", &self.bucket, "o", key, "acl"])
    }

    async fn bearer(&self) -> StorageResult<String> {
        self.tokens.get_token().await.map_err(StorageError::from)
    }
}

async fn error_from_response(response: reqwest::Response) -> GoogleError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    GoogleError::from_response_body(status, &body)
}

#[async_trait]
impl StorageBackend for GcsStorage {
    async fn save(&self, key: &str, bytes: Bytes, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        let url = self.upload_url(key)?;
        let token = self.bearer().await?;
        let size = bytes.len();

        debug!(bucket = %self.bucket, key = %key, size, "Uploading object");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::WriteFailed(GoogleError::from(e).to_string()))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            error!(bucket = %self.bucket, key = %key, "Upload failed: {}", err);
            return Err(StorageError::WriteFailed(err.to_string()));
        }

        info!(bucket = %self.bucket, key = %key, size, "Object uploaded");
        Ok(())
    }

    async fn make_public(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let url = self.acl_url(key)?;
        let token = self.bearer().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({"entity": "allUsers", "role": "READER"}))
            .send()
            .await
            .map_err(|e| StorageError::VisibilityFailed(GoogleError::from(e).to_string()))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            error!(bucket = %self.bucket, key = %key, "ACL update failed: {}", err);
            return Err(if err.is_not_found() {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::VisibilityFailed(err.to_string())
            });
        }

        debug!(bucket = %self.bucket, key = %key, "Object made public");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        match Url::parse(&self.public_base) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments
                        .pop_if_empty()
                        .push(&self.bucket)
                        .extend(key.split('/'));
                }
                url.to_string()
            }
            Err(_) => format!("{}/{}/{}", self.public_base, self.bucket, key),
        }
    }

    fn name(&self) -> &'static str {
        "gcs"
    }
}
