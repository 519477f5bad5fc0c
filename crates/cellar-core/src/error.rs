use std::time::Duration;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Error type shared by every storage backend.
///
/// `AlreadyExists` and `NotFound` only reach callers on operations where
/// the condition is genuinely a failure (e.g. downloading a missing blob).
/// Idempotent create/delete operations report those conditions through
/// their outcome values instead.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Bad or missing credentials / endpoint fields. Raised at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Container or blob absent where one was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Container or blob already present where absence was required.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Container is pending deletion on the service side. Retry later.
    #[error("pending deletion, retry later: {0}")]
    TransientConflict(String),

    /// Name rejected by sanitization or safe-join (escapes the storage root,
    /// too long, too many segments, or empty).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A remote call exceeded the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Local I/O failure (buffering, spooling).
    #[error("io error: {0}")]
    Io(String),

    /// Classified remote or transport failure. Never swallowed.
    #[error("service error: {0}")]
    Service(String),
}

impl StorageError {
    /// Whether this error is a missing container or blob.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Whether this error is an already-present container or blob.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists(_))
    }

    /// Whether the operation is worth retrying after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::TransientConflict(_) | StorageError::Timeout(_)
        )
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
