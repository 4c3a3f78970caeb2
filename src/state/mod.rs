use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::info;

use crate::config::{ServerConfig, StorageBackendKind};
use crate::core::providers::google::{DEVSTORAGE_FULL_CONTROL_SCOPE, GoogleAuthClient};
use crate::core::publisher::ResultPublisher;
use crate::core::storage::{GcsStorage, ObjectStoreStorage, StorageBackend};
use crate::core::synthesizer::SpeechSynthesizer;

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Shared synthesis pipeline; one remote session is opened per request
    pub synthesizer: SpeechSynthesizer,
}

impl AppState {
    /// Build the state with the storage backend selected in `config`.
    pub fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let storage = build_storage(&config)?;
        info!(backend = storage.name(), "Storage backend ready");

        let publisher = ResultPublisher::new(storage, config.storage_prefix.clone());
        let synthesizer = SpeechSynthesizer::new(config.realtime_config(), publisher);
        Ok(Self::with_synthesizer(config, synthesizer))
    }

    /// Build the state around an existing synthesizer.
    pub fn with_synthesizer(config: ServerConfig, synthesizer: SpeechSynthesizer) -> Arc<Self> {
        Arc::new(Self {
            config,
            synthesizer,
        })
    }
}

fn build_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config.storage_backend {
        StorageBackendKind::Local => Ok(Arc::new(ObjectStoreStorage::local(
            &config.audio_dir,
            config.local_audio_base_url(),
        )?)),
        StorageBackendKind::Gcs => {
            let bucket = config
                .storage_bucket
                .clone()
                .ok_or_else(|| anyhow!("FIREBASE_STORAGE_BUCKET is required for the gcs backend"))?;
            let tokens = GoogleAuthClient::from_setting(
                config.google_credentials.as_deref(),
                &[DEVSTORAGE_FULL_CONTROL_SCOPE],
            )
            .context("Failed to load Google credentials for storage")?;
            Ok(Arc::new(GcsStorage::new(bucket, Arc::new(tokens))?))
        }
    }
}
