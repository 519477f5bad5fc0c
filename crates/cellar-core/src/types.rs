use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Stream of blob content chunks.
pub type ByteStream = futures::stream::BoxStream<'static, Result<bytes::Bytes>>;

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    /// Blob name, including any virtual directory segments ("a/b.txt").
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Content type, if the service reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Entity tag as reported by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Properties of a single blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    /// Size in bytes.
    pub size: u64,
    /// Content type, if the service reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Entity tag as reported by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// A signed, time-bounded, read-only capability for one blob.
///
/// Computed locally from the account credentials; producing one performs no
/// network round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedAccessToken {
    /// Opaque query-string fragment to append to the blob URL.
    pub token: String,
    /// Full signed URL for the blob.
    pub url: String,
    /// Expiry encoded in the token.
    pub expires_at: DateTime<Utc>,
}

impl SharedAccessToken {
    /// Whether the token's expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Result of a create-container call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    /// The container was created by this call.
    Created,
    /// The container was already present; treated as success.
    AlreadyExists,
}

/// Result of a delete call (container or blob).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The resource existed and was deleted.
    Deleted,
    /// The resource was already absent; treated as success.
    NotFound,
}

/// Result of an upload call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The blob was written.
    Uploaded,
    /// The target container was missing; it was created and the upload
    /// retried exactly once.
    UploadedAfterCreate,
    /// The blob already existed and overwriting was not requested; the
    /// existing content was preserved.
    SkippedExisting,
}

/// Options applied to a single upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Replace an existing blob. When false (the default) an upload over an
    /// existing name is a no-op success.
    pub overwrite: bool,
    /// Content type to record with the blob.
    pub content_type: Option<String>,
    /// Cache-Control header to record with the blob.
    pub cache_control: Option<String>,
}

impl UploadOptions {
    /// Options with the non-destructive defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overwrite policy.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the Cache-Control header.
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }
}
