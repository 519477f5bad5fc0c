use std::future::Future;
use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;

use crate::error::{Result, StorageError};
use crate::store::BlobStore;
use crate::types::{
    BlobEntry, BlobProperties, CreateOutcome, DeleteOutcome, SharedAccessToken, UploadOptions,
    UploadOutcome,
};

/// Blocking façade over any [`BlobStore`].
///
/// Owns the wrapped store together with one private current-thread tokio
/// runtime, created at construction and dropped with the façade. Every
/// method drives the corresponding async operation to completion, so the
/// caller observes only call latency, never suspension.
///
/// Must not be created or used from inside an async runtime, where
/// `block_on` panics. Async callers use the [`BlobStore`] trait directly.
///
/// A façade serializes its own operations; callers that need concurrent
/// logical operations take one façade per operation stream.
pub struct BlockingClient<S> {
    store: S,
    runtime: tokio::runtime::Runtime,
}

impl<S: BlobStore> BlockingClient<S> {
    /// Wraps `store` with a fresh single-threaded runtime.
    pub fn new(store: S) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::Io(format!("failed to start runtime: {e}")))?;
        Ok(Self { store, runtime })
    }

    /// Borrows the wrapped store.
    pub fn get_ref(&self) -> &S {
        &self.store
    }

    /// Unwraps the store, discarding the runtime.
    pub fn into_inner(self) -> S {
        self.store
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Blocking [`BlobStore::list_containers`].
    pub fn list_containers(&self) -> Result<Vec<String>> {
        self.block_on(self.store.list_containers())
    }

    /// Blocking [`BlobStore::create_container`].
    pub fn create_container(&self, container: &str) -> Result<CreateOutcome> {
        self.block_on(self.store.create_container(container))
    }

    /// Blocking [`BlobStore::delete_container`].
    pub fn delete_container(&self, container: &str) -> Result<DeleteOutcome> {
        self.block_on(self.store.delete_container(container))
    }

    /// Blocking [`BlobStore::container_exists`].
    pub fn container_exists(&self, container: &str) -> Result<bool> {
        self.block_on(self.store.container_exists(container))
    }

    /// Blocking [`BlobStore::list_blobs`].
    pub fn list_blobs(&self, container: &str) -> Result<Vec<BlobEntry>> {
        self.block_on(self.store.list_blobs(container))
    }

    /// Blocking [`BlobStore::upload_blob`].
    pub fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<UploadOutcome> {
        self.block_on(self.store.upload_blob(container, blob, data, options))
    }

    /// Blocking [`BlobStore::read_blob`].
    pub fn read_blob(&self, container: &str, blob: &str) -> Result<Bytes> {
        self.block_on(self.store.read_blob(container, blob))
    }

    /// Streams a blob's content into `writer`, returning the byte count.
    pub fn download_to<W: Write>(&self, container: &str, blob: &str, writer: &mut W) -> Result<u64> {
        self.block_on(async {
            let mut stream = self.store.download_blob(container, blob).await?;
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                writer.write_all(&chunk)?;
                written += chunk.len() as u64;
            }
            Ok(written)
        })
    }

    /// Blocking [`BlobStore::delete_blob`].
    pub fn delete_blob(&self, container: &str, blob: &str) -> Result<DeleteOutcome> {
        self.block_on(self.store.delete_blob(container, blob))
    }

    /// Blocking [`BlobStore::blob_properties`].
    pub fn blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        self.block_on(self.store.blob_properties(container, blob))
    }

    /// Blocking [`BlobStore::blob_exists`].
    pub fn blob_exists(&self, container: &str, blob: &str) -> Result<bool> {
        self.block_on(self.store.blob_exists(container, blob))
    }

    /// Blocking [`BlobStore::blob_url`].
    pub fn blob_url(&self, container: &str, blob: &str) -> Result<String> {
        self.block_on(self.store.blob_url(container, blob))
    }

    /// Blocking [`BlobStore::shared_access_token`].
    pub fn shared_access_token(
        &self,
        container: &str,
        blob: &str,
        ttl: Option<Duration>,
    ) -> Result<SharedAccessToken> {
        self.block_on(self.store.shared_access_token(container, blob, ttl))
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for BlockingClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("store", &self.store)
            .finish()
    }
}
