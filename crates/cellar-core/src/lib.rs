//! Core traits and types for cellar blob storage backends.
//!
//! This crate defines the abstractions shared between the cloud and
//! in-memory backends:
//! - `BlobStore`: container and blob operations, one async operation set
//! - `BlockingClient`: blocking façade driving any `BlobStore` on a private
//!   runtime
//! - `MemoryStore`: in-memory backend for tests and local development
//! - `StorageError`: typed error taxonomy shared by every backend

mod blocking;
mod error;
mod memory;
mod store;
mod types;

pub use blocking::BlockingClient;
pub use error::{Result, StorageError};
pub use memory::MemoryStore;
pub use store::{BlobStore, DEFAULT_TOKEN_TTL};
pub use types::{
    BlobEntry, BlobProperties, ByteStream, CreateOutcome, DeleteOutcome, SharedAccessToken,
    UploadOptions, UploadOutcome,
};
