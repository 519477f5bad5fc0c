//! Azure Blob Storage backend for cellar.
//!
//! The [`ConnectionDescriptor`] resolves credentials and account endpoints
//! from either a connection string or discrete fields, purely by string
//! assembly. [`AzureBlobStore`] implements the `cellar_core::BlobStore`
//! operation set over the platform SDK clients; wire protocol, auth and
//! pagination stay the SDK's concern.

mod client;
mod connection;
mod error;

pub use client::{AzureBlobStore, DEFAULT_TIMEOUT};
pub use connection::{
    AccountEndpoints, AccountLocation, ConnectionBuilder, ConnectionDescriptor, Protocol,
    DEFAULT_ENDPOINT_SUFFIX,
};
