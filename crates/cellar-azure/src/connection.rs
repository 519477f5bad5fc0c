use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use cellar_core::{Result, StorageError};

/// Hosted-service endpoint suffix used when none is configured.
pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Zone segment of the static-website endpoint.
const WEB_ENDPOINT_ZONE: &str = "z31";

/// Transport protocol for the storage endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Https => f.write_str("https"),
        }
    }
}

/// Where the storage account lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountLocation {
    /// Hosted service reached through `{account}.{service}.{suffix}` domains.
    Hosted { endpoint_suffix: String },
    /// Local emulator reached through explicit host and per-service ports.
    /// At least one port is always present.
    Emulator {
        host: String,
        blob_port: Option<u16>,
        queue_port: Option<u16>,
        table_port: Option<u16>,
    },
}

/// Account-level URLs for each sub-service.
///
/// Hosted accounts carry all five; emulator accounts carry one URL per
/// configured port and no file or web endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEndpoints {
    pub blob: Option<String>,
    pub file: Option<String>,
    pub queue: Option<String>,
    pub table: Option<String>,
    pub web: Option<String>,
}

/// Immutable connection descriptor: credentials plus resolved endpoints.
///
/// Built once from either a connection string or discrete fields (exactly
/// one of the two), purely by string assembly; construction performs no
/// network I/O.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    protocol: Protocol,
    account_name: String,
    account_key: String,
    location: AccountLocation,
    endpoints: AccountEndpoints,
}

impl ConnectionDescriptor {
    /// Starts a builder with the default (https, hosted) settings.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::default()
    }

    /// Parses a semicolon-separated `Key=Value` connection string.
    ///
    /// Pairs are order-insensitive; any subset carrying at least
    /// `AccountName` and `AccountKey` is accepted.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut protocol = None;
        let mut account_name = None;
        let mut account_key = None;
        let mut endpoint_suffix = None;
        let mut blob_endpoint = None;
        let mut queue_endpoint = None;
        let mut table_endpoint = None;

        for pair in connection_string.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                StorageError::Configuration(format!("malformed connection string pair: {pair}"))
            })?;
            match key {
                "DefaultEndpointsProtocol" => {
                    protocol = Some(match value {
                        "http" => Protocol::Http,
                        "https" => Protocol::Https,
                        other => {
                            return Err(StorageError::Configuration(format!(
                                "unsupported protocol: {other}"
                            )))
                        }
                    });
                }
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "EndpointSuffix" => endpoint_suffix = Some(value.to_string()),
                "BlobEndpoint" => blob_endpoint = Some(value.to_string()),
                "QueueEndpoint" => queue_endpoint = Some(value.to_string()),
                "TableEndpoint" => table_endpoint = Some(value.to_string()),
                other => {
                    return Err(StorageError::Configuration(format!(
                        "unknown connection string key: {other}"
                    )))
                }
            }
        }

        let account_name = account_name.ok_or_else(|| {
            StorageError::Configuration("connection string is missing AccountName".into())
        })?;
        let account_key = account_key.ok_or_else(|| {
            StorageError::Configuration("connection string is missing AccountKey".into())
        })?;
        let protocol = protocol.unwrap_or_default();

        let location = if blob_endpoint.is_some()
            || queue_endpoint.is_some()
            || table_endpoint.is_some()
        {
            let mut host = None;
            let mut blob_port = None;
            let mut queue_port = None;
            let mut table_port = None;
            for (endpoint, port_slot) in [
                (blob_endpoint, &mut blob_port),
                (queue_endpoint, &mut queue_port),
                (table_endpoint, &mut table_port),
            ] {
                if let Some(endpoint) = endpoint {
                    let (endpoint_host, endpoint_port) = parse_endpoint(&endpoint)?;
                    host.get_or_insert(endpoint_host);
                    *port_slot = Some(endpoint_port);
                }
            }
            AccountLocation::Emulator {
                // At least one endpoint parsed above, so the host is set.
                host: host.unwrap_or_default(),
                blob_port,
                queue_port,
                table_port,
            }
        } else {
            AccountLocation::Hosted {
                endpoint_suffix: endpoint_suffix
                    .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            }
        };

        Self::assemble(protocol, account_name, account_key, location)
    }

    fn assemble(
        protocol: Protocol,
        account_name: String,
        account_key: String,
        location: AccountLocation,
    ) -> Result<Self> {
        if account_name.is_empty() {
            return Err(StorageError::Configuration("account name is empty".into()));
        }
        if BASE64_STANDARD.decode(&account_key).is_err() {
            return Err(StorageError::Configuration(
                "account key is not valid base64".into(),
            ));
        }
        if let AccountLocation::Emulator {
            blob_port,
            queue_port,
            table_port,
            host,
        } = &location
        {
            if host.is_empty() {
                return Err(StorageError::Configuration("emulator host is empty".into()));
            }
            if blob_port.is_none() && queue_port.is_none() && table_port.is_none() {
                return Err(StorageError::Configuration(
                    "emulator location requires at least one service port".into(),
                ));
            }
        }
        let endpoints = derive_endpoints(protocol, &account_name, &location);
        Ok(Self {
            protocol,
            account_name,
            account_key,
            location,
            endpoints,
        })
    }

    /// Endpoint protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Storage account name.
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Storage account key (secret).
    pub fn account_key(&self) -> &str {
        &self.account_key
    }

    /// Where the account lives.
    pub fn location(&self) -> &AccountLocation {
        &self.location
    }

    /// Account-level service URLs, derived once at construction.
    pub fn endpoints(&self) -> &AccountEndpoints {
        &self.endpoints
    }

    /// Assembles the canonical connection string; every derivable key
    /// appears exactly once.
    pub fn connection_string(&self) -> String {
        let mut parts = vec![
            format!("DefaultEndpointsProtocol={}", self.protocol),
            format!("AccountName={}", self.account_name),
            format!("AccountKey={}", self.account_key),
        ];
        match &self.location {
            AccountLocation::Emulator {
                host,
                blob_port,
                queue_port,
                table_port,
            } => {
                for (key, port) in [
                    ("BlobEndpoint", blob_port),
                    ("QueueEndpoint", queue_port),
                    ("TableEndpoint", table_port),
                ] {
                    if let Some(port) = port {
                        parts.push(format!(
                            "{key}={}://{host}:{port}/{}",
                            self.protocol, self.account_name
                        ));
                    }
                }
            }
            AccountLocation::Hosted { endpoint_suffix } => {
                parts.push(format!("EndpointSuffix={endpoint_suffix}"));
            }
        }
        parts.join(";")
    }
}

// The key never appears in debug output.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("protocol", &self.protocol)
            .field("account_name", &self.account_name)
            .field("location", &self.location)
            .finish()
    }
}

fn derive_endpoints(
    protocol: Protocol,
    account_name: &str,
    location: &AccountLocation,
) -> AccountEndpoints {
    match location {
        AccountLocation::Hosted { endpoint_suffix } => AccountEndpoints {
            blob: Some(format!("https://{account_name}.blob.{endpoint_suffix}")),
            file: Some(format!("https://{account_name}.file.{endpoint_suffix}")),
            queue: Some(format!("https://{account_name}.queue.{endpoint_suffix}")),
            table: Some(format!("https://{account_name}.table.{endpoint_suffix}")),
            web: Some(format!(
                "https://{account_name}.{WEB_ENDPOINT_ZONE}.web.{endpoint_suffix}"
            )),
        },
        AccountLocation::Emulator {
            host,
            blob_port,
            queue_port,
            table_port,
        } => {
            let service_url =
                |port: &Option<u16>| port.map(|p| format!("{protocol}://{host}:{p}/{account_name}"));
            AccountEndpoints {
                blob: service_url(blob_port),
                file: None,
                queue: service_url(queue_port),
                table: service_url(table_port),
                web: None,
            }
        }
    }
}

/// Extracts `(host, port)` from an `{protocol}://{host}:{port}/{account}`
/// endpoint URL.
fn parse_endpoint(endpoint: &str) -> Result<(String, u16)> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| {
            StorageError::Configuration(format!("endpoint has no http(s) scheme: {endpoint}"))
        })?;
    let authority = rest.split('/').next().unwrap_or(rest);
    let (host, port) = authority.split_once(':').ok_or_else(|| {
        StorageError::Configuration(format!("endpoint has no port: {endpoint}"))
    })?;
    let port: u16 = port.parse().map_err(|_| {
        StorageError::Configuration(format!("endpoint port is not a number: {endpoint}"))
    })?;
    Ok((host.to_string(), port))
}

/// Builder for [`ConnectionDescriptor`].
///
/// Exactly one of a connection string or the discrete
/// {protocol, account name, account key} fields must be supplied.
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    connection_string: Option<String>,
    protocol: Protocol,
    account_name: Option<String>,
    account_key: Option<String>,
    endpoint_suffix: Option<String>,
    host: Option<String>,
    blob_port: Option<u16>,
    queue_port: Option<u16>,
    table_port: Option<u16>,
}

impl ConnectionBuilder {
    /// Uses a pre-built connection string.
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Sets the endpoint protocol (https by default).
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the account name.
    pub fn account_name(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = Some(account_name.into());
        self
    }

    /// Sets the account key.
    pub fn account_key(mut self, account_key: impl Into<String>) -> Self {
        self.account_key = Some(account_key.into());
        self
    }

    /// Sets the hosted-service endpoint suffix.
    pub fn endpoint_suffix(mut self, endpoint_suffix: impl Into<String>) -> Self {
        self.endpoint_suffix = Some(endpoint_suffix.into());
        self
    }

    /// Sets the emulator host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the emulator blob port.
    pub fn blob_port(mut self, port: u16) -> Self {
        self.blob_port = Some(port);
        self
    }

    /// Sets the emulator queue port.
    pub fn queue_port(mut self, port: u16) -> Self {
        self.queue_port = Some(port);
        self
    }

    /// Sets the emulator table port.
    pub fn table_port(mut self, port: u16) -> Self {
        self.table_port = Some(port);
        self
    }

    /// Validates the inputs and assembles the descriptor.
    pub fn build(self) -> Result<ConnectionDescriptor> {
        let discrete_given = self.account_name.is_some() || self.account_key.is_some();
        match (&self.connection_string, discrete_given) {
            (Some(_), true) => Err(StorageError::Configuration(
                "supply either a connection string or account name and key, not both".into(),
            )),
            (Some(connection_string), false) => {
                ConnectionDescriptor::from_connection_string(connection_string)
            }
            (None, _) => {
                let (Some(account_name), Some(account_key)) =
                    (self.account_name, self.account_key)
                else {
                    return Err(StorageError::Configuration(
                        "supply a connection string, or an account name and account key".into(),
                    ));
                };
                let any_port = self.blob_port.is_some()
                    || self.queue_port.is_some()
                    || self.table_port.is_some();
                let location = match self.host {
                    Some(host) => {
                        if !any_port {
                            return Err(StorageError::Configuration(
                                "an emulator host requires at least one service port".into(),
                            ));
                        }
                        AccountLocation::Emulator {
                            host,
                            blob_port: self.blob_port,
                            queue_port: self.queue_port,
                            table_port: self.table_port,
                        }
                    }
                    None if any_port => {
                        return Err(StorageError::Configuration(
                            "service ports require an emulator host".into(),
                        ));
                    }
                    None => {
                        let endpoint_suffix = self
                            .endpoint_suffix
                            .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string());
                        if endpoint_suffix.is_empty() {
                            return Err(StorageError::Configuration(
                                "supply an emulator host and port, or an endpoint suffix".into(),
                            ));
                        }
                        AccountLocation::Hosted { endpoint_suffix }
                    }
                };
                ConnectionDescriptor::assemble(self.protocol, account_name, account_key, location)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_extracts_host_and_port() {
        let (host, port) = parse_endpoint("http://127.0.0.1:10000/devstoreaccount1").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 10000);
    }

    #[test]
    fn test_parse_endpoint_rejects_missing_scheme() {
        assert!(parse_endpoint("127.0.0.1:10000").is_err());
    }

    #[test]
    fn test_parse_endpoint_rejects_missing_port() {
        assert!(parse_endpoint("http://localhost/account").is_err());
    }
}
