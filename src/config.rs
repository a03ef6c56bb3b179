use std::fmt;

use chrono::TimeDelta;
use thiserror::Error;

/// Largest grace period a `TimeDelta` can hold, in seconds.
pub const MAX_ORPHAN_GRACE_SECONDS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// A credential that must not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Orphaned objects younger than this are left alone by repair
    pub orphan_grace_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    /// Directory for the embedded metadata database
    pub data_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Azure,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Azure storage account name
    pub account: Option<String>,
    /// Azure shared access signature
    pub sas_token: Option<Secret>,
    /// Azure blob container
    pub container: Option<String>,
    /// Blob endpoint override (e.g. Azurite)
    pub endpoint: Option<String>,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// Base URL local objects are served from
    pub public_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataBackend {
    Cosmos,
    Local,
    Relay,
}

#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    pub cosmos_endpoint: Option<String>,
    pub cosmos_key: Option<Secret>,
    /// Base URL of a metadata relay
    pub relay_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            account: None,
            sas_token: None,
            container: None,
            endpoint: None,
            local_storage_path: "./files".to_string(),
            public_base_url: "http://localhost:5000".to_string(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::Local,
            cosmos_endpoint: None,
            cosmos_key: None,
            relay_url: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5000".to_string());
        let data_dir = var("DATA_DIR").unwrap_or_else(|| "./data".to_string());

        let max_upload_size = parse_number(var("MAX_UPLOAD_SIZE"), "MAX_UPLOAD_SIZE")?
            .unwrap_or(50 * 1024 * 1024); // 50MB
        let orphan_grace_seconds =
            parse_number(var("ORPHAN_GRACE_SECONDS"), "ORPHAN_GRACE_SECONDS")?.unwrap_or(3600);

        let storage_backend = match var("STORAGE_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "azure" => StorageBackend::Azure,
            "local" => StorageBackend::Local,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "STORAGE_BACKEND must be 'azure' or 'local', got '{other}'"
                )))
            }
        };

        let metadata_backend = match var("METADATA_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "cosmos" => MetadataBackend::Cosmos,
            "local" => MetadataBackend::Local,
            "relay" => MetadataBackend::Relay,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "METADATA_BACKEND must be 'cosmos', 'local' or 'relay', got '{other}'"
                )))
            }
        };

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                account: var("STORAGE_ACCOUNT"),
                sas_token: var("STORAGE_SAS").map(Secret::new),
                container: var("STORAGE_CONTAINER"),
                endpoint: var("STORAGE_ENDPOINT"),
                local_storage_path: var("LOCAL_STORAGE_PATH")
                    .unwrap_or_else(|| "./files".to_string()),
                public_base_url: var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:5000".to_string()),
            },
            metadata: MetadataConfig {
                backend: metadata_backend,
                cosmos_endpoint: var("COSMOS_ENDPOINT"),
                cosmos_key: var("COSMOS_KEY").map(Secret::new),
                relay_url: var("RELAY_URL"),
            },
            max_upload_size,
            orphan_grace_seconds,
        };

        config.validate()?;
        Ok(config)
    }

    /// Minimum age before repair may delete an orphaned object.
    ///
    /// Saturates at the largest representable span, so an out-of-range value
    /// protects every orphan instead of none.
    pub fn orphan_grace(&self) -> TimeDelta {
        i64::try_from(self.orphan_grace_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Azure {
            require(&self.storage.account, "STORAGE_ACCOUNT")?;
            require(&self.storage.sas_token, "STORAGE_SAS")?;
            require(&self.storage.container, "STORAGE_CONTAINER")?;
        }

        match self.metadata.backend {
            MetadataBackend::Cosmos => {
                require(&self.metadata.cosmos_endpoint, "COSMOS_ENDPOINT")?;
                require(&self.metadata.cosmos_key, "COSMOS_KEY")?;
            }
            MetadataBackend::Relay => {
                require(&self.metadata.relay_url, "RELAY_URL")?;
            }
            MetadataBackend::Local => {}
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.orphan_grace_seconds > MAX_ORPHAN_GRACE_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "ORPHAN_GRACE_SECONDS must be at most {MAX_ORPHAN_GRACE_SECONDS}"
            )));
        }

        if self.storage.backend == StorageBackend::Local
            && self.metadata.backend == MetadataBackend::Cosmos
        {
            tracing::warn!(
                "Local object storage with Cosmos metadata: stored URLs point at this node only"
            );
        }

        Ok(())
    }
}

fn require<T>(value: &Option<T>, key: &str) -> Result<(), ConfigError> {
    match value {
        Some(_) => Ok(()),
        None => Err(ConfigError::Missing(key.to_string())),
    }
}

fn parse_number(value: Option<String>, key: &str) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("{key} must be a non-negative integer"))
            })
        })
        .transpose()
}
