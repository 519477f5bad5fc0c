use std::time::Duration;

use cellar_azure::{AzureBlobStore, ConnectionDescriptor, Protocol};
use cellar_core::{BlockingClient, Result, StorageError};
use clap::Parser;

use crate::storage::{BlobFileStorage, StorageConfig};

/// Environment-driven settings for an Azure-backed file storage.
///
/// Every field is readable from the environment; `from_env` resolves the
/// whole set without consulting the command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "cellar-files")]
#[command(about = "Azure-backed file storage settings")]
pub struct StorageSettings {
    /// Pre-built connection string (exclusive with the discrete fields)
    #[arg(long, env = "AZURE_CONNECTION_STRING")]
    pub connection_string: Option<String>,

    /// Storage account name
    #[arg(long, env = "AZURE_ACCOUNT_NAME")]
    pub account_name: Option<String>,

    /// Storage account key
    #[arg(long, env = "AZURE_ACCOUNT_KEY")]
    pub account_key: Option<String>,

    /// Endpoint protocol, http or https
    #[arg(long, env = "AZURE_PROTOCOL")]
    pub protocol: Option<String>,

    /// Hosted-service endpoint suffix
    #[arg(long, env = "AZURE_ENDPOINT_SUFFIX")]
    pub endpoint_suffix: Option<String>,

    /// Emulator host
    #[arg(long, env = "AZURE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    /// Emulator blob port
    #[arg(long, env = "AZURE_BLOB_PORT")]
    pub blob_port: Option<u16>,

    /// Emulator queue port
    #[arg(long, env = "AZURE_QUEUE_PORT")]
    pub queue_port: Option<u16>,

    /// Emulator table port
    #[arg(long, env = "AZURE_TABLE_PORT")]
    pub table_port: Option<u16>,

    /// Container backing the storage
    #[arg(long, env = "AZURE_CONTAINER")]
    pub container: Option<String>,

    /// Root prefix every name is joined under
    #[arg(long, env = "AZURE_LOCATION", default_value = "")]
    pub location: String,

    /// Per-call timeout in seconds
    #[arg(long, env = "AZURE_CONNECT_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,

    /// Bytes buffered in memory per download before spilling to disk
    #[arg(long, env = "AZURE_BLOB_MAX_MEMORY_SIZE", default_value_t = 20 * 1024 * 1024)]
    pub max_memory_size: usize,

    /// Replace existing blobs on save
    #[arg(long, env = "AZURE_OVERWRITE_FILES")]
    pub overwrite_files: bool,

    /// Cache-Control header recorded with uploads
    #[arg(long, env = "AZURE_CACHE_CONTROL")]
    pub cache_control: Option<String>,

    /// Lifetime in seconds of shared-access URLs; unsigned URLs when unset
    #[arg(long, env = "AZURE_URL_EXPIRATION_SECS")]
    pub url_expiration_secs: Option<u64>,
}

impl StorageSettings {
    /// Resolves the settings from the environment alone.
    pub fn from_env() -> Result<Self> {
        Self::try_parse_from(["cellar-files"])
            .map_err(|e| StorageError::Configuration(e.to_string()))
    }

    /// Builds the connection descriptor for these settings.
    pub fn connection_descriptor(&self) -> Result<ConnectionDescriptor> {
        let mut builder = ConnectionDescriptor::builder();
        if let Some(connection_string) = &self.connection_string {
            builder = builder.connection_string(connection_string);
        }
        if let Some(account_name) = &self.account_name {
            builder = builder.account_name(account_name);
        }
        if let Some(account_key) = &self.account_key {
            builder = builder.account_key(account_key);
        }
        if let Some(protocol) = &self.protocol {
            builder = builder.protocol(match protocol.as_str() {
                "http" => Protocol::Http,
                "https" => Protocol::Https,
                other => {
                    return Err(StorageError::Configuration(format!(
                        "unsupported protocol: {other}"
                    )))
                }
            });
        }
        if let Some(endpoint_suffix) = &self.endpoint_suffix {
            builder = builder.endpoint_suffix(endpoint_suffix);
        }
        if let Some(host) = &self.emulator_host {
            builder = builder.host(host);
        }
        if let Some(port) = self.blob_port {
            builder = builder.blob_port(port);
        }
        if let Some(port) = self.queue_port {
            builder = builder.queue_port(port);
        }
        if let Some(port) = self.table_port {
            builder = builder.table_port(port);
        }
        builder.build()
    }

    /// Wires the settings into a ready file storage: descriptor, store,
    /// blocking façade, adapter.
    pub fn into_storage(self) -> Result<BlobFileStorage<AzureBlobStore>> {
        let container = self.container.clone().ok_or_else(|| {
            StorageError::Configuration("a container name is required".into())
        })?;
        let descriptor = self.connection_descriptor()?;
        let store =
            AzureBlobStore::with_timeout(descriptor, Duration::from_secs(self.timeout_secs))?;
        let client = BlockingClient::new(store)?;

        let mut config = StorageConfig::new()
            .with_location(self.location)
            .with_overwrite_files(self.overwrite_files)
            .with_max_memory_size(self.max_memory_size);
        if let Some(cache_control) = self.cache_control {
            config = config.with_cache_control(cache_control);
        }
        if let Some(secs) = self.url_expiration_secs {
            config = config.with_url_expiration(Duration::from_secs(secs));
        }
        Ok(BlobFileStorage::with_config(client, container, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    /// Well-known development-emulator account key (public, not a secret).
    const TEST_KEY: &str =
        "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

    #[test]
    fn test_settings_resolve_a_hosted_descriptor() {
        let settings = StorageSettings::try_parse_from([
            "cellar-files",
            "--account-name",
            "stacc",
            "--account-key",
            TEST_KEY,
            "--container",
            "media",
        ])
        .unwrap();

        let descriptor = settings.connection_descriptor().unwrap();
        assert_eq!(descriptor.account_name(), "stacc");
        assert_eq!(settings.timeout_secs, 20);
        assert_eq!(settings.max_memory_size, 20 * 1024 * 1024);
        assert!(!settings.overwrite_files);
    }

    #[test]
    fn test_settings_without_credentials_fail_configuration() {
        let settings = StorageSettings::try_parse_from(["cellar-files"]).unwrap();
        let err = settings.connection_descriptor().unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[test]
    fn test_missing_container_is_a_configuration_error() {
        let settings = StorageSettings::try_parse_from([
            "cellar-files",
            "--account-name",
            "stacc",
            "--account-key",
            TEST_KEY,
        ])
        .unwrap();
        let err = settings.into_storage().unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }
}
