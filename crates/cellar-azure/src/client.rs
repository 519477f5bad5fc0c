use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use azure_storage::shared_access_signature::service_sas::BlobSasPermissions;
use azure_storage::shared_access_signature::SasToken;
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::{BlobClient, BlobServiceClient, ClientBuilder, ContainerClient};
use bytes::Bytes;
use cellar_core::{
    BlobEntry, BlobProperties, BlobStore, ByteStream, CreateOutcome, DeleteOutcome, Result,
    SharedAccessToken, StorageError, UploadOptions, UploadOutcome, DEFAULT_TOKEN_TTL,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, instrument};

use crate::connection::{AccountLocation, ConnectionDescriptor, DEFAULT_ENDPOINT_SUFFIX};
use crate::error::classify;

/// Timeout applied to every remote call unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Azure Blob Storage backend.
///
/// Wraps the platform SDK clients built from a [`ConnectionDescriptor`];
/// transport, auth and pagination are the SDK's concern. One timeout value
/// bounds every remote call.
#[derive(Clone)]
pub struct AzureBlobStore {
    service: BlobServiceClient,
    descriptor: ConnectionDescriptor,
    timeout: Duration,
}

impl AzureBlobStore {
    /// Creates a store with the default per-call timeout.
    pub fn new(descriptor: ConnectionDescriptor) -> Result<Self> {
        Self::with_timeout(descriptor, DEFAULT_TIMEOUT)
    }

    /// Creates a store with an explicit per-call timeout.
    pub fn with_timeout(descriptor: ConnectionDescriptor, timeout: Duration) -> Result<Self> {
        let credentials = StorageCredentials::access_key(
            descriptor.account_name().to_string(),
            descriptor.account_key().to_string(),
        );
        let location = cloud_location(&descriptor)?;
        let service = ClientBuilder::with_location(location, credentials).blob_service_client();
        Ok(Self {
            service,
            descriptor,
            timeout,
        })
    }

    /// The descriptor this store was built from.
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    fn container_client(&self, container: &str) -> ContainerClient {
        self.service.container_client(container)
    }

    fn blob_client(&self, container: &str, blob: &str) -> BlobClient {
        self.container_client(container).blob_client(blob)
    }

    async fn timed<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))?
    }

    async fn put_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<()> {
        let client = self.blob_client(container, blob);
        let mut request = client.put_block_blob(data);
        if let Some(content_type) = &options.content_type {
            request = request.content_type(content_type.clone());
        }
        if let Some(cache_control) = &options.cache_control {
            request = request.cache_control(cache_control.clone());
        }
        self.timed(async {
            request
                .await
                .map(|_| ())
                .map_err(|e| classify(&format!("upload blob {container}/{blob}"), e))
        })
        .await
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    #[instrument(skip(self), level = "debug")]
    async fn list_containers(&self) -> Result<Vec<String>> {
        self.timed(async {
            let mut names = Vec::new();
            let mut pages = self.service.list_containers().into_stream();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| classify("list containers", e))?;
                names.extend(page.containers.into_iter().map(|c| c.name));
            }
            Ok(names)
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_container(&self, container: &str) -> Result<CreateOutcome> {
        let client = self.container_client(container);
        let result = self
            .timed(async {
                client
                    .create()
                    .await
                    .map(|_| ())
                    .map_err(|e| classify(&format!("create container {container}"), e))
            })
            .await;
        match result {
            Ok(()) => {
                debug!(container, "created container");
                Ok(CreateOutcome::Created)
            }
            Err(e) if e.is_already_exists() => {
                debug!(container, "container already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_container(&self, container: &str) -> Result<DeleteOutcome> {
        let client = self.container_client(container);
        let result = self
            .timed(async {
                client
                    .delete()
                    .await
                    .map(|_| ())
                    .map_err(|e| classify(&format!("delete container {container}"), e))
            })
            .await;
        match result {
            Ok(()) => {
                debug!(container, "deleted container");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                debug!(container, "container not found");
                Ok(DeleteOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_blobs(&self, container: &str) -> Result<Vec<BlobEntry>> {
        let client = self.container_client(container);
        self.timed(async {
            let mut entries = Vec::new();
            let mut pages = client.list_blobs().into_stream();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| classify(&format!("list blobs in {container}"), e))?;
                for blob in page.blobs.blobs() {
                    entries.push(BlobEntry {
                        name: blob.name.clone(),
                        size: blob.properties.content_length,
                        content_type: none_if_empty(blob.properties.content_type.clone()),
                        last_modified: to_chrono(blob.properties.last_modified),
                        etag: Some(blob.properties.etag.to_string()),
                    });
                }
            }
            Ok(entries)
        })
        .await
    }

    #[instrument(skip(self, data), level = "debug", fields(data_len = data.len()))]
    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<UploadOutcome> {
        if !options.overwrite {
            match self.blob_properties(container, blob).await {
                Ok(_) => {
                    debug!(container, blob, "blob exists, skipping upload");
                    return Ok(UploadOutcome::SkippedExisting);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        match self.put_blob(container, blob, data.clone(), options).await {
            Ok(()) => Ok(UploadOutcome::Uploaded),
            Err(e) if e.is_not_found() => {
                // Container missing: create it and retry the upload exactly
                // once. A container still in its pending-delete window
                // surfaces here as TransientConflict.
                debug!(container, "container missing, creating before retry");
                self.create_container(container).await?;
                self.put_blob(container, blob, data, options).await?;
                Ok(UploadOutcome::UploadedAfterCreate)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn download_blob(&self, container: &str, blob: &str) -> Result<ByteStream> {
        let client = self.blob_client(container, blob);
        let context = format!("download blob {container}/{blob}");
        let timeout = self.timeout;
        let stream = client.get().into_stream().then(move |chunk| {
            let context = context.clone();
            async move {
                let collect = async {
                    match chunk {
                        Ok(response) => response
                            .data
                            .collect()
                            .await
                            .map_err(|e| classify(&context, e)),
                        Err(e) => Err(classify(&context, e)),
                    }
                };
                match tokio::time::timeout(timeout, collect).await {
                    Ok(result) => result,
                    Err(_) => Err(StorageError::Timeout(timeout)),
                }
            }
        });
        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), level = "debug")]
    async fn read_blob(&self, container: &str, blob: &str) -> Result<Bytes> {
        let client = self.blob_client(container, blob);
        self.timed(async {
            client
                .get_content()
                .await
                .map(Bytes::from)
                .map_err(|e| classify(&format!("read blob {container}/{blob}"), e))
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_blob(&self, container: &str, blob: &str) -> Result<DeleteOutcome> {
        let client = self.blob_client(container, blob);
        let result = self
            .timed(async {
                client
                    .delete()
                    .await
                    .map(|_| ())
                    .map_err(|e| classify(&format!("delete blob {container}/{blob}"), e))
            })
            .await;
        match result {
            Ok(()) => {
                debug!(container, blob, "deleted blob");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                debug!(container, blob, "blob not found");
                Ok(DeleteOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        let client = self.blob_client(container, blob);
        let response = self
            .timed(async {
                client
                    .get_properties()
                    .await
                    .map_err(|e| classify(&format!("blob properties {container}/{blob}"), e))
            })
            .await?;
        let properties = response.blob.properties;
        Ok(BlobProperties {
            size: properties.content_length,
            content_type: none_if_empty(properties.content_type),
            last_modified: to_chrono(properties.last_modified),
            etag: Some(properties.etag.to_string()),
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn blob_url(&self, container: &str, blob: &str) -> Result<String> {
        let client = self.blob_client(container, blob);
        client
            .url()
            .map(|url| url.to_string())
            .map_err(|e| classify(&format!("blob url {container}/{blob}"), e))
    }

    /// Purely computed from the account key; no network round trip.
    #[instrument(skip(self), level = "debug")]
    async fn shared_access_token(
        &self,
        container: &str,
        blob: &str,
        ttl: Option<Duration>,
    ) -> Result<SharedAccessToken> {
        let ttl = ttl.unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StorageError::Configuration(format!("ttl out of range: {e}")))?;
        let expiry = time::OffsetDateTime::from_unix_timestamp(expires_at.timestamp())
            .map_err(|e| StorageError::Configuration(format!("expiry out of range: {e}")))?;

        let permissions = BlobSasPermissions {
            read: true,
            ..Default::default()
        };
        let context = format!("shared access token {container}/{blob}");
        let client = self.blob_client(container, blob);
        let signature = client
            .shared_access_signature(permissions, expiry)
            .await
            .map_err(|e| classify(&context, e))?;
        let token = signature.token().map_err(|e| classify(&context, e))?;
        let url = client
            .generate_signed_blob_url(&signature)
            .map_err(|e| classify(&context, e))?
            .to_string();
        Ok(SharedAccessToken {
            token,
            url,
            expires_at,
        })
    }
}

impl std::fmt::Debug for AzureBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobStore")
            .field("account", &self.descriptor.account_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Picks the SDK cloud location for a descriptor: public cloud for the
/// default suffix, the blob endpoint as a custom location otherwise
/// (including the emulator, which therefore requires a blob port).
fn cloud_location(descriptor: &ConnectionDescriptor) -> Result<CloudLocation> {
    let account = descriptor.account_name().to_string();
    match descriptor.location() {
        AccountLocation::Hosted { endpoint_suffix }
            if endpoint_suffix.as_str() == DEFAULT_ENDPOINT_SUFFIX =>
        {
            Ok(CloudLocation::Public { account })
        }
        _ => {
            let uri = descriptor.endpoints().blob.clone().ok_or_else(|| {
                StorageError::Configuration(
                    "blob operations require a blob endpoint (set a blob port)".into(),
                )
            })?;
            Ok(CloudLocation::Custom { account, uri })
        }
    }
}

fn to_chrono(timestamp: time::OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), timestamp.nanosecond())
        .unwrap_or_else(Utc::now)
}

fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
