//! Object storage for finished audio.
//!
//! [`StorageBackend`] is the narrow interface the publisher depends on. Two
//! implementations ship:
//!
//! - [`GcsStorage`]: Firebase / Google Cloud Storage over the JSON API
//! - [`ObjectStoreStorage`]: any `object_store` store (local disk, memory)

mod gcs;
mod object;

pub use gcs::{GCS_API_BASE, GCS_PUBLIC_BASE, GcsStorage};
pub use object::ObjectStoreStorage;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::providers::google::GoogleError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Failed to make object public: {0}")]
    VisibilityFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage authentication failed: {0}")]
    AuthenticationFailed(String),
}

impl From<GoogleError> for StorageError {
    fn from(e: GoogleError) -> Self {
        match e {
            GoogleError::AuthenticationFailed(msg) => StorageError::AuthenticationFailed(msg),
            other => StorageError::WriteFailed(other.to_string()),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage collaborator used to publish containers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing object.
    async fn save(&self, key: &str, bytes: Bytes, content_type: &str) -> StorageResult<()>;

    /// Make the object at `key` readable without credentials.
    async fn make_public(&self, key: &str) -> StorageResult<()>;

    /// URL at which a public object can be fetched.
    fn public_url(&self, key: &str) -> String;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Reject keys that would escape the namespace or produce an empty path.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(StorageError::InvalidKey(format!("{key:?}")));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "{key:?} contains an empty or relative segment"
        )));
    }
    Ok(())
}
