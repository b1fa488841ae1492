use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use svckit::config::{
    ConsistencyLevel, Credentials, DatabaseConfig, Endpoint, ObservabilityConfig, ReplicationConfig,
};

/// Tunables read from an optional config file and `KEYSPACE_TRANSFER__*` variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub connection: ConnectionConfig,
    pub replication: ReplicationConfig,
    pub writer: WriterConfig,
    pub progress: ProgressConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub connection_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub consistency: ConsistencyLevel,
    pub pool_size: u32,
    pub source_credentials: Option<Credentials>,
    pub target_credentials: Option<Credentials>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 60,
            request_timeout_secs: 60,
            consistency: ConsistencyLevel::Quorum,
            pool_size: 4,
            source_credentials: None,
            target_credentials: None,
        }
    }
}

impl ConnectionConfig {
    pub fn database_config(
        &self,
        endpoint: Endpoint,
        credentials: Option<Credentials>,
    ) -> DatabaseConfig {
        DatabaseConfig {
            endpoint,
            credentials,
            consistency: self.consistency,
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            pool_size: self.pool_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Outstanding writes allowed per available core.
    pub writers_per_core: usize,
    /// Fixed pool size, overriding `writers_per_core`.
    pub concurrency: Option<usize>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            writers_per_core: 2,
            concurrency: None,
        }
    }
}

impl WriterConfig {
    pub fn pool_size(&self) -> usize {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        self.concurrency
            .unwrap_or(cores * self.writers_per_core)
            .max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub write_interval: u64,
    pub skip_interval: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            write_interval: 100,
            skip_interval: 1000,
        }
    }
}

pub fn load_config(path: Option<&str>) -> Result<TransferConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::with_name(path));
    }

    let config = builder
        .add_source(
            Environment::with_prefix("KEYSPACE_TRANSFER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
