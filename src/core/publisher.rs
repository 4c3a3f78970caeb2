//! Publishes finished containers through a [`StorageBackend`].

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{error, info};

use crate::core::audio::WAV_CONTENT_TYPE;
use crate::core::storage::{StorageBackend, StorageResult};

/// Writes containers under time-unique keys and returns their public URLs.
#[derive(Clone)]
pub struct ResultPublisher {
    storage: Arc<dyn StorageBackend>,
    prefix: String,
}

impl ResultPublisher {
    /// `prefix` is prepended verbatim; include a trailing `/` for a directory.
    pub fn new(storage: Arc<dyn StorageBackend>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// `<prefix>response_<unix millis>.wav`
    pub fn object_key(&self, timestamp_millis: i64) -> String {
        format!("{}response_{timestamp_millis}.wav", self.prefix)
    }

    /// Save, open, and resolve the URL of one container. No retries.
    pub async fn publish(&self, container: Vec<u8>) -> StorageResult<String> {
        let key = self.object_key(Utc::now().timestamp_millis());
        let size = container.len();

        let result = self.store(&key, container).await;

        match &result {
            Ok(url) => info!(
                backend = self.storage.name(),
                key = %key,
                size,
                url = %url,
                "Audio published"
            ),
            Err(e) => error!(backend = self.storage.name(), key = %key, "Publish failed: {}", e),
        }
        result
    }

    async fn store(&self, key: &str, container: Vec<u8>) -> StorageResult<String> {
        self.storage
            .save(key, Bytes::from(container), WAV_CONTENT_TYPE)
            .await?;
        self.storage.make_public(key).await?;
        Ok(self.storage.public_url(key))
    }
}
