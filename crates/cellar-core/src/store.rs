use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

use crate::error::Result;
use crate::types::{
    BlobEntry, BlobProperties, ByteStream, CreateOutcome, DeleteOutcome, SharedAccessToken,
    UploadOptions, UploadOutcome,
};

/// Default shared-access-token lifetime when the caller does not pick one.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Container and blob operations against one storage account.
///
/// Container and blob identity are explicit call parameters on every
/// operation, so a single store value can serve concurrent logical
/// operations without call-order coupling.
///
/// Idempotency policy: `create_container` and the delete operations report
/// already-exists / not-found through their outcome values. Reads of a
/// missing blob fail with [`StorageError::NotFound`]. Anything the backend
/// cannot classify is returned as a typed error, never logged-and-swallowed.
///
/// [`StorageError::NotFound`]: crate::StorageError::NotFound
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Lists container names, in the order the service returns them.
    async fn list_containers(&self) -> Result<Vec<String>>;

    /// Creates a container. Already-present containers are a success.
    async fn create_container(&self, container: &str) -> Result<CreateOutcome>;

    /// Deletes a container. Absent containers are a success.
    async fn delete_container(&self, container: &str) -> Result<DeleteOutcome>;

    /// Lists the blobs of a container (flat; virtual directories appear as
    /// name prefixes).
    async fn list_blobs(&self, container: &str) -> Result<Vec<BlobEntry>>;

    /// Writes `data` under `blob`.
    ///
    /// If the container is missing it is created and the upload retried
    /// exactly once; a container pending deletion at that point surfaces as
    /// [`StorageError::TransientConflict`]. With `options.overwrite` unset
    /// and the blob already present, the write is skipped and reported as
    /// [`UploadOutcome::SkippedExisting`].
    ///
    /// [`StorageError::TransientConflict`]: crate::StorageError::TransientConflict
    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<UploadOutcome>;

    /// Opens a stream over the blob's content.
    async fn download_blob(&self, container: &str, blob: &str) -> Result<ByteStream>;

    /// Materializes the blob's entire content in memory.
    async fn read_blob(&self, container: &str, blob: &str) -> Result<Bytes> {
        let mut stream = self.download_blob(container, blob).await?;
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Deletes a blob. An absent blob is a success.
    async fn delete_blob(&self, container: &str, blob: &str) -> Result<DeleteOutcome>;

    /// Fetches size, content type, last-modified and etag for a blob.
    async fn blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties>;

    /// Unsigned URL of a blob.
    async fn blob_url(&self, container: &str, blob: &str) -> Result<String>;

    /// Computes a read-only shared-access token for a blob, valid for `ttl`
    /// from the moment of the call ([`DEFAULT_TOKEN_TTL`] when `None`).
    async fn shared_access_token(
        &self,
        container: &str,
        blob: &str,
        ttl: Option<Duration>,
    ) -> Result<SharedAccessToken>;

    /// Whether the container exists.
    ///
    /// Derived from the full container listing, so it costs O(n) in the
    /// number of containers; the service listing is itself unindexed.
    async fn container_exists(&self, container: &str) -> Result<bool> {
        Ok(self
            .list_containers()
            .await?
            .iter()
            .any(|name| name == container))
    }

    /// Whether the blob exists in the container.
    ///
    /// Derived from the full blob listing, so it costs O(n) in the number of
    /// blobs in the container.
    async fn blob_exists(&self, container: &str, blob: &str) -> Result<bool> {
        Ok(self
            .list_blobs(container)
            .await?
            .iter()
            .any(|entry| entry.name == blob))
    }
}
