//! Pluggable file-storage adapter backed by cellar blob stores.
//!
//! Maps a framework-style storage contract (open/save/delete/exists/
//! listdir/size/url) onto any `cellar_core::BlobStore` through the blocking
//! façade. Caller-supplied names are cleaned and joined under a configured
//! root; anything resolving outside the root is rejected.

mod file;
mod paths;
mod settings;
mod storage;

pub use file::StorageFile;
pub use paths::{clean_name, safe_join, validate_path, NAME_MAX_LEN, NAME_MAX_SLASHES};
pub use settings::StorageSettings;
pub use storage::{BlobFileStorage, FileStorage, StorageConfig};
