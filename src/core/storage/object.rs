//! Storage backend over any [`ObjectStore`].
//!
//! Used with `LocalFileSystem` for development (the server exposes the
//! directory under `/audio`) and with `InMemory` in tests. Such stores have no
//! ACLs; "public" means the object exists under a prefix someone else serves.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{Error as ObjectStoreError, ObjectStore, PutPayload, path::Path as ObjectPath};
use tracing::{debug, info};

use super::{StorageBackend, StorageError, StorageResult, validate_key};

pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl std::fmt::Debug for ObjectStoreStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreStorage")
            .field("store", &self.store.to_string())
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl ObjectStoreStorage {
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Store rooted at `dir`, which must already exist.
    pub fn local(dir: impl AsRef<Path>, public_base_url: impl Into<String>) -> StorageResult<Self> {
        let dir = dir.as_ref();
        let store = LocalFileSystem::new_with_prefix(dir).map_err(|e| {
            StorageError::WriteFailed(format!(
                "cannot use {} as audio directory: {e}",
                dir.display()
            ))
        })?;
        Ok(Self::new(Arc::new(store), public_base_url))
    }

    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), public_base_url)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn path(key: &str) -> StorageResult<ObjectPath> {
        validate_key(key)?;
        ObjectPath::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreStorage {
    /// `content_type` is not recorded; local stores reject attributes and
    /// whoever serves the prefix derives it from the extension.
    async fn save(&self, key: &str, bytes: Bytes, content_type: &str) -> StorageResult<()> {
        let path = Self::path(key)?;
        let size = bytes.len();
        self.store
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        info!(key = %key, size, content_type, "Object stored");
        Ok(())
    }

    async fn make_public(&self, key: &str) -> StorageResult<()> {
        let path = Self::path(key)?;
        match self.store.head(&path).await {
            Ok(meta) => {
                debug!(key = %key, size = meta.size, "Object is servable");
                Ok(())
            }
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::VisibilityFailed(e.to_string())),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn name(&self) -> &'static str {
        "object_store"
    }
}
