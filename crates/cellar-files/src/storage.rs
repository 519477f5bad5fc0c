use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cellar_core::{BlobStore, BlockingClient, Result, StorageError, UploadOptions};
use tracing::debug;

use crate::file::StorageFile;
use crate::paths::{clean_name, safe_join, validate_path, NAME_MAX_LEN};

/// Length of the random suffix appended by [`FileStorage::get_available_name`].
const ALTERNATE_SUFFIX_LEN: usize = 7;

/// Pluggable file-storage contract consumed by a hosting framework.
///
/// Names are caller-supplied and untrusted; implementations sanitize them
/// and reject anything resolving outside their configured root.
pub trait FileStorage {
    /// Readable, seekable handle type returned by [`FileStorage::open`].
    type File: Read + std::io::Seek;

    /// Opens a stored file for reading.
    fn open(&self, name: &str) -> Result<Self::File>;

    /// Stores `content` under `name`, returning the cleaned name actually
    /// used. An existing target is preserved unless the overwrite policy
    /// says otherwise; the skipped write still reports success.
    fn save(&self, name: &str, content: &mut dyn Read) -> Result<String>;

    /// Removes a stored file. Removing an absent file is a success.
    fn delete(&self, name: &str) -> Result<()>;

    /// Whether a stored file exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Lists the first-level directories and files under `path`. The
    /// listing is flat on the storage side; directories are virtual.
    fn listdir(&self, path: &str) -> Result<(Vec<String>, Vec<String>)>;

    /// Size of a stored file in bytes.
    fn size(&self, name: &str) -> Result<u64>;

    /// Public URL of a stored file.
    fn url(&self, name: &str) -> Result<String>;

    /// Returns a name derived from `name` that is free to save to,
    /// capped at `max_length` characters (1024 when `None`).
    fn get_available_name(&self, name: &str, max_length: Option<usize>) -> Result<String>;
}

/// Behavior knobs for [`BlobFileStorage`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root prefix every name is joined under.
    pub location: String,
    /// Replace existing blobs on save. Off by default: saving over an
    /// existing name preserves the stored content.
    pub overwrite_files: bool,
    /// Bytes buffered in memory per download before spilling to a
    /// temporary file.
    pub max_memory_size: usize,
    /// Cache-Control header recorded with every upload.
    pub cache_control: Option<String>,
    /// When set, `url` returns a shared-access URL with this lifetime
    /// instead of the unsigned blob URL.
    pub url_expiration: Option<Duration>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            overwrite_files: false,
            max_memory_size: 20 * 1024 * 1024,
            cache_control: None,
            url_expiration: None,
        }
    }
}

impl StorageConfig {
    /// Configuration with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root prefix.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the overwrite policy.
    pub fn with_overwrite_files(mut self, overwrite: bool) -> Self {
        self.overwrite_files = overwrite;
        self
    }

    /// Sets the in-memory download buffer threshold.
    pub fn with_max_memory_size(mut self, max_memory_size: usize) -> Self {
        self.max_memory_size = max_memory_size;
        self
    }

    /// Sets the Cache-Control header.
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    /// Makes `url` return shared-access URLs with the given lifetime.
    pub fn with_url_expiration(mut self, expiration: Duration) -> Self {
        self.url_expiration = Some(expiration);
        self
    }
}

pub(crate) struct SharedState<S> {
    pub(crate) client: BlockingClient<S>,
    pub(crate) container: String,
    pub(crate) location: String,
    pub(crate) overwrite_files: bool,
    pub(crate) max_memory_size: usize,
    pub(crate) cache_control: Option<String>,
    pub(crate) url_expiration: Option<Duration>,
}

/// File-storage adapter over any [`BlobStore`], one container per adapter.
///
/// Every operation is blocking; the wrapped [`BlockingClient`] drives the
/// store on its private runtime.
pub struct BlobFileStorage<S: BlobStore> {
    shared: Arc<SharedState<S>>,
}

impl<S: BlobStore> BlobFileStorage<S> {
    /// Adapter with the default configuration.
    pub fn new(client: BlockingClient<S>, container: impl Into<String>) -> Self {
        Self::with_config(client, container, StorageConfig::default())
    }

    /// Adapter with explicit configuration.
    pub fn with_config(
        client: BlockingClient<S>,
        container: impl Into<String>,
        config: StorageConfig,
    ) -> Self {
        Self {
            shared: Arc::new(SharedState {
                client,
                container: container.into(),
                location: config.location,
                overwrite_files: config.overwrite_files,
                max_memory_size: config.max_memory_size,
                cache_control: config.cache_control,
                url_expiration: config.url_expiration,
            }),
        }
    }

    /// The container this adapter reads and writes.
    pub fn container(&self) -> &str {
        &self.shared.container
    }

    /// Cleans `name`, joins it under the root and validates the result.
    /// Idempotent: feeding a returned path back yields the same path.
    fn blob_path(&self, name: &str) -> Result<String> {
        validate_path(&safe_join(&self.shared.location, &clean_name(name))?)
    }

    /// Directory prefix (with trailing slash) for a listing path.
    fn dir_prefix(&self, path: &str) -> Result<String> {
        let cleaned = clean_name(path);
        let joined = safe_join(&self.shared.location, &cleaned)?;
        let joined = joined.trim_end_matches('/');
        if joined.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("{joined}/"))
        }
    }
}

impl<S: BlobStore> FileStorage for BlobFileStorage<S> {
    type File = StorageFile<S>;

    fn open(&self, name: &str) -> Result<Self::File> {
        let path = self.blob_path(name)?;
        Ok(StorageFile::new(self.shared.clone(), path))
    }

    fn save(&self, name: &str, content: &mut dyn Read) -> Result<String> {
        let cleaned = clean_name(name);
        let path = self.blob_path(name)?;

        let mut data = Vec::new();
        content.read_to_end(&mut data)?;

        let mut options = UploadOptions::new().with_overwrite(self.shared.overwrite_files);
        if let Some(content_type) = mime_guess::from_path(&path).first_raw() {
            options = options.with_content_type(content_type);
        }
        if let Some(cache_control) = &self.shared.cache_control {
            options = options.with_cache_control(cache_control.clone());
        }

        let outcome = self.shared.client.upload_blob(
            &self.shared.container,
            &path,
            Bytes::from(data),
            &options,
        )?;
        debug!(path = %path, ?outcome, "saved file");
        Ok(cleaned)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        let outcome = self
            .shared
            .client
            .delete_blob(&self.shared.container, &path)?;
        debug!(path = %path, ?outcome, "deleted file");
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let path = self.blob_path(name)?;
        match self.shared.client.blob_exists(&self.shared.container, &path) {
            Ok(exists) => Ok(exists),
            // A missing container holds no files.
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn listdir(&self, path: &str) -> Result<(Vec<String>, Vec<String>)> {
        let prefix = self.dir_prefix(path)?;
        let entries = match self.shared.client.list_blobs(&self.shared.container) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            let Some(rest) = entry.name.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    if !dirs.iter().any(|d| d == dir) {
                        dirs.push(dir.to_string());
                    }
                }
                None => files.push(rest.to_string()),
            }
        }
        Ok((dirs, files))
    }

    fn size(&self, name: &str) -> Result<u64> {
        let path = self.blob_path(name)?;
        Ok(self
            .shared
            .client
            .blob_properties(&self.shared.container, &path)?
            .size)
    }

    fn url(&self, name: &str) -> Result<String> {
        let path = self.blob_path(name)?;
        match self.shared.url_expiration {
            Some(expiration) => Ok(self
                .shared
                .client
                .shared_access_token(&self.shared.container, &path, Some(expiration))?
                .url),
            None => self.shared.client.blob_url(&self.shared.container, &path),
        }
    }

    fn get_available_name(&self, name: &str, max_length: Option<usize>) -> Result<String> {
        let max_length = max_length.unwrap_or(NAME_MAX_LEN);
        let candidate = clean_name(name);
        if self.shared.overwrite_files {
            return Ok(candidate);
        }

        let (dir, filename) = match candidate.rsplit_once('/') {
            Some((dir, filename)) => (Some(dir), filename),
            None => (None, candidate.as_str()),
        };
        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, format!(".{extension}")),
            _ => (filename, String::new()),
        };

        let mut candidate = candidate.clone();
        while self.exists(&candidate)? || candidate.len() > max_length {
            let suffix: String = uuid::Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(ALTERNATE_SUFFIX_LEN)
                .collect();
            let mut stem_used = stem.to_string();
            loop {
                let filename = format!("{stem_used}_{suffix}{extension}");
                let next = match dir {
                    Some(dir) => format!("{dir}/{filename}"),
                    None => filename,
                };
                if next.len() <= max_length {
                    candidate = next;
                    break;
                }
                let overflow = next.len() - max_length;
                if overflow >= stem_used.len() {
                    return Err(StorageError::InvalidName(format!(
                        "no available name for {name} fits in {max_length} characters"
                    )));
                }
                stem_used.truncate(stem_used.len() - overflow);
            }
        }
        Ok(candidate)
    }
}

impl<S: BlobStore + std::fmt::Debug> std::fmt::Debug for BlobFileStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobFileStorage")
            .field("container", &self.shared.container)
            .field("location", &self.shared.location)
            .field("overwrite_files", &self.shared.overwrite_files)
            .finish()
    }
}
