use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::errors::SyncError;

pub const DEFAULT_CQL_PORT: u16 = 9042;

/// A single `host[:port]` contact point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse `host`, `host:port` or `[v6addr]:port`. The port defaults to 9042.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let raw = raw.trim();

        let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                SyncError::ConfigError(format!("Unterminated IPv6 address in host '{}'", raw))
            })?;
            match tail {
                "" => (host, None),
                _ => match tail.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => {
                        return Err(SyncError::ConfigError(format!(
                            "Unexpected characters after IPv6 address in host '{}'",
                            raw
                        )))
                    }
                },
            }
        } else {
            match raw.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (raw, None),
            }
        };

        if host.is_empty() {
            return Err(SyncError::ConfigError(format!("Missing host name in '{}'", raw)));
        }

        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|e| {
                SyncError::ConfigError(format!("Invalid port '{}' in host '{}': {}", p, raw, e))
            })?,
            None => DEFAULT_CQL_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Address in the form the driver expects for a known node.
    pub fn contact_point(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.contact_point())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    #[default]
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl From<ConsistencyLevel> for scylla::statement::Consistency {
    fn from(level: ConsistencyLevel) -> Self {
        use scylla::statement::Consistency;

        match level {
            ConsistencyLevel::Any => Consistency::Any,
            ConsistencyLevel::One => Consistency::One,
            ConsistencyLevel::Two => Consistency::Two,
            ConsistencyLevel::Three => Consistency::Three,
            ConsistencyLevel::Quorum => Consistency::Quorum,
            ConsistencyLevel::All => Consistency::All,
            ConsistencyLevel::LocalQuorum => Consistency::LocalQuorum,
            ConsistencyLevel::EachQuorum => Consistency::EachQuorum,
            ConsistencyLevel::LocalOne => Consistency::LocalOne,
        }
    }
}

/// Everything needed to open one session against one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub endpoint: Endpoint,
    pub credentials: Option<Credentials>,
    pub consistency: ConsistencyLevel,
    pub connection_timeout: Duration,
    pub request_timeout: Duration,
    pub pool_size: u32,
}

impl DatabaseConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint {
                host: "localhost".to_string(),
                port: DEFAULT_CQL_PORT,
            },
            credentials: None,
            consistency: ConsistencyLevel::Quorum,
            connection_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(60),
            pool_size: 4,
        }
    }
}

/// Replication settings used when the destination keyspace has to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub class: String,
    pub options: BTreeMap<String, String>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert("replication_factor".to_string(), "3".to_string());
        Self {
            class: "SimpleStrategy".to_string(),
            options,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "keyspace_transfer=info,svckit=info".to_string(),
        }
    }
}
