use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use cellar_core::BlobStore;
use tempfile::SpooledTempFile;
use tracing::debug;

use crate::storage::SharedState;

/// A readable, seekable handle over one stored file.
///
/// The remote content is downloaded lazily on first access into a spooled
/// buffer: memory up to the configured threshold, a temporary file beyond
/// it. After the download the handle is rewound to the start.
pub struct StorageFile<S: BlobStore> {
    path: String,
    shared: Arc<SharedState<S>>,
    file: Option<SpooledTempFile>,
}

impl<S: BlobStore> StorageFile<S> {
    pub(crate) fn new(shared: Arc<SharedState<S>>, path: String) -> Self {
        Self {
            path,
            shared,
            file: None,
        }
    }

    /// The validated blob path this handle reads from.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn ensure_file(&mut self) -> io::Result<&mut SpooledTempFile> {
        if self.file.is_none() {
            let mut file = SpooledTempFile::new(self.shared.max_memory_size);
            let written = self
                .shared
                .client
                .download_to(&self.shared.container, &self.path, &mut file)
                .map_err(|e| {
                    let kind = if e.is_not_found() {
                        io::ErrorKind::NotFound
                    } else {
                        io::ErrorKind::Other
                    };
                    io::Error::new(kind, e)
                })?;
            file.seek(SeekFrom::Start(0))?;
            debug!(path = %self.path, bytes = written, "downloaded file into spooled buffer");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "download buffer missing"))
    }
}

impl<S: BlobStore> Read for StorageFile<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_file()?.read(buf)
    }
}

impl<S: BlobStore> Seek for StorageFile<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.ensure_file()?.seek(pos)
    }
}

impl<S: BlobStore> std::fmt::Debug for StorageFile<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFile")
            .field("path", &self.path)
            .field("downloaded", &self.file.is_some())
            .finish()
    }
}
