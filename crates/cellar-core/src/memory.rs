use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::store::{BlobStore, DEFAULT_TOKEN_TTL};
use crate::types::{
    BlobEntry, BlobProperties, ByteStream, CreateOutcome, DeleteOutcome, SharedAccessToken,
    UploadOptions, UploadOutcome,
};

/// One stored blob.
#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
    etag: String,
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// container name -> blob name -> blob
    containers: DashMap<String, BTreeMap<String, StoredBlob>>,
    /// Containers simulating the service's pending-delete window.
    pending_delete: DashSet<String>,
}

/// In-memory [`BlobStore`] for tests and local development.
///
/// Implements the same upload fallback and overwrite-skip semantics as the
/// remote backends, so the policy branches are exercisable without a live
/// service. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a container as pending deletion: creates targeting it fail with
    /// [`StorageError::TransientConflict`] until cleared.
    pub fn mark_pending_delete(&self, container: &str) {
        self.inner.pending_delete.insert(container.to_string());
    }

    /// Clears a pending-delete mark.
    pub fn clear_pending_delete(&self, container: &str) {
        self.inner.pending_delete.remove(container);
    }

    fn store_blob(&self, container: &str, blob: &str, data: Bytes, options: &UploadOptions) {
        let stored = StoredBlob {
            data,
            content_type: options.content_type.clone(),
            last_modified: Utc::now(),
            etag: uuid::Uuid::new_v4().simple().to_string(),
        };
        self.inner
            .containers
            .entry(container.to_string())
            .or_default()
            .insert(blob.to_string(), stored);
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn list_containers(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .inner
            .containers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn create_container(&self, container: &str) -> Result<CreateOutcome> {
        if self.inner.pending_delete.contains(container) {
            return Err(StorageError::TransientConflict(format!(
                "container {container} is being deleted"
            )));
        }
        if self.inner.containers.contains_key(container) {
            debug!(container, "container already exists");
            return Ok(CreateOutcome::AlreadyExists);
        }
        self.inner
            .containers
            .insert(container.to_string(), BTreeMap::new());
        debug!(container, "created container");
        Ok(CreateOutcome::Created)
    }

    async fn delete_container(&self, container: &str) -> Result<DeleteOutcome> {
        match self.inner.containers.remove(container) {
            Some(_) => {
                debug!(container, "deleted container");
                Ok(DeleteOutcome::Deleted)
            }
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn list_blobs(&self, container: &str) -> Result<Vec<BlobEntry>> {
        let blobs = self
            .inner
            .containers
            .get(container)
            .ok_or_else(|| StorageError::NotFound(format!("container {container}")))?;
        Ok(blobs
            .iter()
            .map(|(name, stored)| BlobEntry {
                name: name.clone(),
                size: stored.data.len() as u64,
                content_type: stored.content_type.clone(),
                last_modified: stored.last_modified,
                etag: Some(stored.etag.clone()),
            })
            .collect())
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<UploadOutcome> {
        match self.inner.containers.get(container) {
            Some(blobs) => {
                if !options.overwrite && blobs.contains_key(blob) {
                    debug!(container, blob, "blob exists, skipping upload");
                    return Ok(UploadOutcome::SkippedExisting);
                }
                drop(blobs);
                self.store_blob(container, blob, data, options);
                Ok(UploadOutcome::Uploaded)
            }
            None => {
                // Container missing: create it and retry the upload once.
                debug!(container, "container missing, creating before upload");
                self.create_container(container).await?;
                self.store_blob(container, blob, data, options);
                Ok(UploadOutcome::UploadedAfterCreate)
            }
        }
    }

    async fn download_blob(&self, container: &str, blob: &str) -> Result<ByteStream> {
        let data = self.read_blob(container, blob).await?;
        let chunks: Vec<Result<Bytes>> = vec![Ok(data)];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn read_blob(&self, container: &str, blob: &str) -> Result<Bytes> {
        let blobs = self
            .inner
            .containers
            .get(container)
            .ok_or_else(|| StorageError::NotFound(format!("container {container}")))?;
        let stored = blobs
            .get(blob)
            .ok_or_else(|| StorageError::NotFound(format!("blob {container}/{blob}")))?;
        Ok(stored.data.clone())
    }

    async fn delete_blob(&self, container: &str, blob: &str) -> Result<DeleteOutcome> {
        match self.inner.containers.get_mut(container) {
            Some(mut blobs) => match blobs.remove(blob) {
                Some(_) => {
                    debug!(container, blob, "deleted blob");
                    Ok(DeleteOutcome::Deleted)
                }
                None => Ok(DeleteOutcome::NotFound),
            },
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        let blobs = self
            .inner
            .containers
            .get(container)
            .ok_or_else(|| StorageError::NotFound(format!("container {container}")))?;
        let stored = blobs
            .get(blob)
            .ok_or_else(|| StorageError::NotFound(format!("blob {container}/{blob}")))?;
        Ok(BlobProperties {
            size: stored.data.len() as u64,
            content_type: stored.content_type.clone(),
            last_modified: stored.last_modified,
            etag: Some(stored.etag.clone()),
        })
    }

    async fn blob_url(&self, container: &str, blob: &str) -> Result<String> {
        Ok(format!("memory://{container}/{blob}"))
    }

    async fn shared_access_token(
        &self,
        container: &str,
        blob: &str,
        ttl: Option<Duration>,
    ) -> Result<SharedAccessToken> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl.unwrap_or(DEFAULT_TOKEN_TTL))
                .map_err(|e| StorageError::Configuration(format!("ttl out of range: {e}")))?;
        let token = format!("sp=r&se={}&sig=local", expires_at.to_rfc3339());
        let url = format!("{}?{}", self.blob_url(container, blob).await?, token);
        Ok(SharedAccessToken {
            token,
            url,
            expires_at,
        })
    }
}
